use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::audio::{StreamSettings, MAX_FRAME_SIZE};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub frame_size: usize, // Muestras por canal en cada frame

    // Paths
    pub songs_dir: PathBuf,
    pub cache_file: PathBuf,
    pub ytdlp_path: String,

    // Límites
    pub resolve_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let songs_dir: PathBuf = std::env::var("SONGS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.songs_dir);

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            frame_size: std::env::var("FRAME_SIZE")
                .unwrap_or_else(|_| "960".to_string()) // 20ms @ 48kHz
                .parse()?,

            // Paths
            cache_file: std::env::var("CACHE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| songs_dir.join("songRepo.json")),
            songs_dir,
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),

            // Límites
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            download_timeout_secs: std::env::var("DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
        };

        std::fs::create_dir_all(&config.songs_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Frame size must be non-zero and at most 120ms of audio
    /// - Timeouts must be greater than zero
    pub fn validate(&self) -> Result<()> {
        if self.frame_size == 0 {
            anyhow::bail!("Frame size must be greater than 0");
        }

        if self.frame_size > MAX_FRAME_SIZE {
            anyhow::bail!(
                "Frame size cannot exceed {} samples (120ms), got: {}",
                MAX_FRAME_SIZE,
                self.frame_size
            );
        }

        if self.resolve_timeout_secs == 0 || self.download_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be greater than 0");
        }

        Ok(())
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            frame_size: self.frame_size,
        }
    }

    /// Wall-clock duration of one frame at the output sample rate.
    pub fn frame_duration(&self) -> Duration {
        self.stream_settings().frame_duration()
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Audio: {} samples/frame ({}ms)\n  \
            Songs: {} (cache {})\n  \
            yt-dlp: {} (resolve {}s, download {}s)",
            self.guild_id
                .map_or("global".to_string(), |id| format!("guild {}", id)),
            self.frame_size,
            self.frame_duration().as_millis(),
            self.songs_dir.display(),
            self.cache_file.display(),
            self.ytdlp_path,
            self.resolve_timeout_secs,
            self.download_timeout_secs,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let songs_dir = PathBuf::from("songs");
        Self {
            discord_token: String::new(),
            guild_id: None,

            frame_size: 960, // 20ms at 48kHz

            cache_file: songs_dir.join("songRepo.json"),
            songs_dir,
            ytdlp_path: "yt-dlp".to_string(),

            resolve_timeout_secs: 60,
            download_timeout_secs: 300,
        }
    }
}
