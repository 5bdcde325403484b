//! The `/play` pipeline: resolve, reuse or download, then enqueue.

use serenity::model::id::GuildId;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    audio::{EnqueueOutcome, PlaybackEngine},
    cache::SongCache,
    sources::{Downloader, Resolver, SourceError},
    track::TrackDescriptor,
};

#[derive(Debug, Error)]
pub enum PlayError {
    #[error("could not resolve `{query}`: {source}")]
    Resolution {
        query: String,
        #[source]
        source: SourceError,
    },

    #[error("download of `{title}` did not produce {}", path.display())]
    DownloadIncomplete { title: String, path: PathBuf },
}

/// Result of a successful [`Jukebox::play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOutcome {
    pub track: TrackDescriptor,
    pub from_cache: bool,
    pub enqueue: EnqueueOutcome,
}

pub struct Jukebox {
    engine: PlaybackEngine,
    cache: Arc<SongCache>,
    resolver: Arc<dyn Resolver>,
    downloader: Arc<dyn Downloader>,
    songs_dir: PathBuf,
}

impl Jukebox {
    pub fn new(
        engine: PlaybackEngine,
        cache: Arc<SongCache>,
        resolver: Arc<dyn Resolver>,
        downloader: Arc<dyn Downloader>,
        songs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            cache,
            resolver,
            downloader,
            songs_dir: songs_dir.into(),
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Resolves `query`, reuses the cached file when it still exists or
    /// downloads it otherwise, and queues the track for `guild_id`.
    ///
    /// # Errors
    ///
    /// Nothing is queued when the query cannot be resolved or the download
    /// leaves no file behind.
    pub async fn play(&self, guild_id: GuildId, query: &str) -> Result<PlayOutcome, PlayError> {
        let media = self
            .resolver
            .resolve(query)
            .await
            .map_err(|source| PlayError::Resolution {
                query: query.to_string(),
                source,
            })?;

        let cached = match self.cache.lookup(query, Some(&media.canonical_url)).await {
            Some(track) if file_exists(&track.file_path).await => Some(track),
            Some(track) => {
                warn!(
                    "🗑️ Entrada de caché sin archivo, se descarga de nuevo: {}",
                    track.file_path.display()
                );
                None
            }
            None => None,
        };

        let (track, from_cache) = match cached {
            Some(track) => {
                info!("♻️ Usando caché: {}", track.title);
                (track, true)
            }
            None => {
                let destination = self.songs_dir.join(format!("{}.mp3", media.title));

                if let Err(e) = self.downloader.fetch(&media.canonical_url, &destination).await {
                    warn!("⚠️ El descargador reportó un error: {}", e);
                }

                if !file_exists(&destination).await {
                    return Err(PlayError::DownloadIncomplete {
                        title: media.title,
                        path: destination,
                    });
                }

                let track = TrackDescriptor::new(media.title, media.canonical_url, destination);
                self.cache.store(query, track.clone()).await;
                info!("⬇️ Descargado: {}", track.title);
                (track, false)
            }
        };

        let enqueue = self.engine.enqueue(guild_id, track.clone());

        Ok(PlayOutcome {
            track,
            from_cache,
            enqueue,
        })
    }
}

async fn file_exists(path: &std::path::Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
