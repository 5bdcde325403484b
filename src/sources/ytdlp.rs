use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::{
    path::Path,
    process::Stdio,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{Downloader, ResolvedMedia, Resolver, SourceError};
use crate::config::Config;

/// Characters that cannot appear in a file name on common filesystems.
const UNSAFE_FILENAME_CHARS: &str = r#"[<>:"/\\|?*\x00-\x1F]"#;

/// Resolver and downloader backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
    resolve_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlp {
    pub fn new(
        program: impl Into<String>,
        resolve_timeout: Duration,
        download_timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            resolve_timeout,
            download_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ytdlp_path.clone(),
            config.resolve_timeout(),
            config.download_timeout(),
        )
    }

    /// Checks that the executable runs and returns its version.
    pub async fn verify(&self) -> anyhow::Result<String> {
        let stdout = self.run(&["--version"], self.resolve_timeout).await?;
        let version = String::from_utf8_lossy(&stdout).trim().to_string();
        info!("✅ yt-dlp versión: {}", version);
        Ok(version)
    }

    async fn run(&self, args: &[&str], limit: Duration) -> Result<Vec<u8>, SourceError> {
        debug!("Ejecutando {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(limit, output).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("⏱️ yt-dlp excedió el tiempo límite de {:?}", limit);
                return Err(SourceError::Timeout(limit));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SourceError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Resolver for YtDlp {
    async fn resolve(&self, query: &str) -> Result<ResolvedMedia, SourceError> {
        let target = search_target(query);
        info!("🔍 Resolviendo: {}", target);

        let stdout = self
            .run(&["--dump-json", "--no-playlist", &target], self.resolve_timeout)
            .await?;

        let media = parse_dump(&String::from_utf8_lossy(&stdout), query)?;
        info!("🎯 Resuelto: {} -> {}", media.title, media.canonical_url);
        Ok(media)
    }
}

#[async_trait]
impl Downloader for YtDlp {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), SourceError> {
        info!("⬇️ Descargando {} en {}", url, destination.display());
        let destination = destination.to_string_lossy();

        let result = self
            .run(
                &["-x", "--audio-format", "mp3", "-o", &destination, url],
                self.download_timeout,
            )
            .await;

        if let Err(e) = &result {
            error!("❌ Descarga fallida de {}: {}", url, e);
        }
        result.map(|_| ())
    }
}

/// URLs are passed through; anything else becomes a single-result search.
fn search_target(query: &str) -> String {
    let query = query.trim();
    match Url::parse(query) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
        _ => format!("ytsearch:{query}"),
    }
}

/// Extracts the first media item from `--dump-json` output.
fn parse_dump(stdout: &str, query: &str) -> Result<ResolvedMedia, SourceError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| SourceError::NotFound(query.to_string()))?;

    let value: Value = serde_json::from_str(line)?;
    let entry = match value.get("entries").and_then(Value::as_array) {
        Some(entries) => entries
            .first()
            .ok_or_else(|| SourceError::NotFound(query.to_string()))?,
        None => &value,
    };

    let canonical_url = entry
        .get("webpage_url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| SourceError::NotFound(query.to_string()))?
        .to_string();

    let title = entry
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(sanitize_title)
        .transpose()?
        .unwrap_or_else(fallback_title);

    Ok(ResolvedMedia {
        title,
        canonical_url,
    })
}

/// Makes a title usable as a file name.
pub fn sanitize_title(title: &str) -> Result<String, regex::Error> {
    let unsafe_chars = Regex::new(UNSAFE_FILENAME_CHARS)?;
    Ok(unsafe_chars.replace_all(title, "_").into_owned())
}

fn fallback_title() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("track-{secs}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_target() {
        assert_eq!(
            search_target("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(search_target("  never gonna give you up "), "ytsearch:never gonna give you up");
        assert_eq!(search_target("ftp://example.com/a.mp3"), "ytsearch:ftp://example.com/a.mp3");
        assert_eq!(search_target("artist: song"), "ytsearch:artist: song");
    }

    #[test]
    fn test_sanitize_title() {
        let clean = |t: &str| sanitize_title(t).unwrap();

        assert_eq!(clean("AC/DC - Back In Black"), "AC_DC - Back In Black");
        assert_eq!(clean("What? <Live> \"2024\""), "What_ _Live_ _2024_");
        assert_eq!(clean("tab\there"), "tab_here");
        assert_eq!(clean("Plain Title (Official)"), "Plain Title (Official)");
    }

    #[test]
    fn test_parse_single_video() {
        let json = r#"{"title": "Queen - Bohemian Rhapsody", "webpage_url": "https://www.youtube.com/watch?v=fJ9rUzIMcZQ"}"#;

        let media = parse_dump(json, "bohemian").unwrap();
        assert_eq!(
            media,
            ResolvedMedia {
                title: "Queen - Bohemian Rhapsody".to_string(),
                canonical_url: "https://www.youtube.com/watch?v=fJ9rUzIMcZQ".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_takes_first_entry() {
        let json = r#"{"entries": [{"title": "First/One", "webpage_url": "https://yt/1"}, {"title": "Second", "webpage_url": "https://yt/2"}]}"#;

        let media = parse_dump(json, "q").unwrap();
        assert_eq!(media.title, "First_One");
        assert_eq!(media.canonical_url, "https://yt/1");
    }

    #[test]
    fn test_parse_without_title_uses_fallback() {
        let media = parse_dump(r#"{"webpage_url": "https://yt/x"}"#, "q").unwrap();
        assert!(media.title.starts_with("track-"));
    }

    #[test]
    fn test_parse_requires_url() {
        assert!(matches!(
            parse_dump(r#"{"title": "No Url", "webpage_url": ""}"#, "q"),
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(parse_dump(r#"{"entries": []}"#, "q"), Err(SourceError::NotFound(_))));
        assert!(matches!(parse_dump("", "q"), Err(SourceError::NotFound(_))));
        assert!(matches!(parse_dump("not json", "q"), Err(SourceError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_executable_fails_to_spawn() {
        let ytdlp = YtDlp::new(
            "/definitely/not/yt-dlp",
            Duration::from_secs(5),
            Duration::from_secs(5),
        );

        assert!(matches!(ytdlp.resolve("anything").await, Err(SourceError::Spawn(_))));
    }
}
