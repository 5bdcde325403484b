use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A resolved, locally available media item ready for decoding.
///
/// The serialized field names (`title`, `url`, `filePath`) are the on-disk
/// format of the song cache and must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub title: String,
    #[serde(rename = "url")]
    pub canonical_url: String,
    #[serde(rename = "filePath")]
    pub file_path: PathBuf,
}

impl TrackDescriptor {
    pub fn new(
        title: impl Into<String>,
        canonical_url: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            title: title.into(),
            canonical_url: canonical_url.into(),
            file_path: file_path.into(),
        }
    }
}
