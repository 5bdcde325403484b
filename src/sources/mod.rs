//! Where songs come from: turning a query into a canonical URL and that URL
//! into a local audio file.

pub mod ytdlp;

use async_trait::async_trait;
use std::{path::Path, time::Duration};
use thiserror::Error;

pub use ytdlp::YtDlp;

/// Title and canonical URL of the media a query points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub title: String,
    pub canonical_url: String,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no media found for `{0}`")]
    NotFound(String),

    #[error("failed to run extractor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("extractor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("extractor timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid file name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Resolves free text or a URL to a single media item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<ResolvedMedia, SourceError>;
}

/// Downloads the audio behind a canonical URL.
///
/// Best effort: callers confirm success by checking that `destination`
/// exists afterwards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), SourceError>;
}
