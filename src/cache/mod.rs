//! # Cache Module
//!
//! Durable song cache for the jukebox.
//!
//! Every successful resolution is remembered as a mapping from the normalized
//! query text to the downloaded file, so later requests for the same song
//! (typed slightly differently, or pasted as a URL) reuse the file instead of
//! downloading it again.
//!
//! ## Lookup order
//!
//! 1. **URL identity**: when the caller already knows the canonical URL, an
//!    entry with that exact URL wins immediately.
//! 2. **Fuzzy title match**: otherwise every entry's title is scored against
//!    the query (see [`scoring`]) and the best one is accepted when it reaches
//!    [`scoring::ACCEPT_THRESHOLD`].
//!
//! ## Persistence
//!
//! The whole table is written as pretty JSON after every [`SongCache::store`]:
//!
//! ```json
//! {
//!     "never gonna give you up": {
//!         "title": "Rick Astley - Never Gonna Give You Up (Official Video)",
//!         "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
//!         "filePath": "songs/Rick Astley - Never Gonna Give You Up (Official Video).mp3"
//!     }
//! }
//! ```
//!
//! A failed write is logged and the in-memory table stays authoritative.
//! Entries whose file disappeared are kept; the caller checks the file on a
//! hit and overwrites the entry after downloading again.

pub mod scoring;

use anyhow::Result;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, error, info, warn};

use crate::track::TrackDescriptor;
use scoring::QueryMatcher;

type CacheTable = HashMap<String, TrackDescriptor>;

/// Query-to-file cache shared by every guild.
///
/// The table sits behind a single async lock held for the whole of a lookup
/// (which scans every entry) and of a store (which also rewrites the file).
#[derive(Debug)]
pub struct SongCache {
    cache_file: PathBuf,
    entries: Mutex<CacheTable>,
}

impl SongCache {
    /// Opens the cache stored at `cache_file`, creating an empty one if needed.
    ///
    /// An unreadable or corrupt file is logged and replaced by an empty table.
    pub async fn open(cache_file: impl Into<PathBuf>) -> Result<Self> {
        let cache_file = cache_file.into();

        if let Some(parent) = cache_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        if fs::metadata(&cache_file).await.is_err() {
            fs::write(&cache_file, "{}").await?;
        }

        let entries = load_table(&cache_file).await;
        info!(
            "📂 Caché de canciones cargado: {} entradas desde {}",
            entries.len(),
            cache_file.display()
        );

        Ok(Self {
            cache_file,
            entries: Mutex::new(entries),
        })
    }

    /// Finds a cached track for `query`.
    ///
    /// A non-empty `url_hint` is checked first against canonical URLs and
    /// short-circuits the fuzzy match.
    pub async fn lookup(&self, query: &str, url_hint: Option<&str>) -> Option<TrackDescriptor> {
        let entries = self.entries.lock().await;

        if let Some(url) = url_hint.map(str::trim).filter(|u| !u.is_empty()) {
            if let Some(track) = entries.values().find(|t| t.canonical_url == url) {
                debug!("🎯 Caché por URL: {}", track.title);
                return Some(track.clone());
            }
        }

        let matcher = QueryMatcher::new(query);
        let mut best: Option<(&TrackDescriptor, f64)> = None;

        for track in entries.values() {
            let score = matcher.score(&track.title);
            if best.map_or(score > 0.0, |(_, best_score)| score > best_score) {
                best = Some((track, score));
            }
        }

        match best {
            Some((track, score)) if QueryMatcher::accepts(score) => {
                debug!("🎯 Caché por título ({:.2}): {}", score, track.title);
                Some(track.clone())
            }
            _ => {
                debug!("❔ Sin coincidencia en caché para: {}", matcher.normalized());
                None
            }
        }
    }

    /// Remembers `track` as the answer to `query` and persists the table.
    ///
    /// An existing entry with the same non-empty URL is updated in place and
    /// keeps its original key.
    pub async fn store(&self, query: &str, track: TrackDescriptor) {
        let mut entries = self.entries.lock().await;
        let url = track.canonical_url.trim();

        let existing_key = if url.is_empty() {
            None
        } else {
            entries
                .iter()
                .find(|(_, cached)| !cached.canonical_url.is_empty() && cached.canonical_url == url)
                .map(|(key, _)| key.clone())
        };

        match existing_key {
            Some(key) => {
                info!("♻️ Actualizando entrada de caché '{}': {}", key, track.title);
                entries.insert(key, track);
            }
            None => {
                let key = scoring::normalize(query);
                info!("💾 Nueva entrada de caché '{}': {}", key, track.title);
                entries.insert(key, track);
            }
        }

        if let Err(e) = save_table(&self.cache_file, &entries).await {
            error!(
                "❌ No se pudo guardar el caché en {}: {:?}",
                self.cache_file.display(),
                e
            );
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

}

async fn load_table(cache_file: &Path) -> CacheTable {
    let content = match fs::read_to_string(cache_file).await {
        Ok(content) => content,
        Err(e) => {
            warn!("No se pudo leer el caché {}: {}", cache_file.display(), e);
            return CacheTable::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(table) => table,
        Err(e) => {
            warn!("Caché corrupto, empezando de cero: {}", e);
            CacheTable::new()
        }
    }
}

fn render_table(entries: &CacheTable) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
    entries.serialize(&mut serializer)?;
    content.push(b'\n');
    Ok(content)
}

async fn save_table(cache_file: &Path, entries: &CacheTable) -> Result<()> {
    let content = render_table(entries)?;
    let tmp_file = cache_file.with_extension("json.tmp");
    fs::write(&tmp_file, content).await?;
    fs::rename(&tmp_file, cache_file).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, SongCache) {
        let dir = TempDir::new().unwrap();
        let cache = SongCache::open(dir.path().join("songRepo.json")).await.unwrap();
        (dir, cache)
    }

    fn track(title: &str, url: &str) -> TrackDescriptor {
        TrackDescriptor::new(title, url, format!("/songs/{title}.mp3"))
    }

    #[tokio::test]
    async fn test_open_creates_empty_file() {
        let (dir, cache) = open_temp().await;
        assert!(cache.is_empty().await);

        let content = std::fs::read_to_string(dir.path().join("songRepo.json")).unwrap();
        assert_eq!(content, "{}");
    }

    #[tokio::test]
    async fn test_store_then_lookup_round_trip() {
        let (_dir, cache) = open_temp().await;
        let song = track("Queen - Bohemian Rhapsody", "https://yt/bohemian");

        cache.store("  Bohemian Rhapsody ", song.clone()).await;

        assert_eq!(cache.lookup("bohemian rhapsody", None).await, Some(song));
    }

    #[tokio::test]
    async fn test_url_hint_beats_perfect_title_match() {
        let (_dir, cache) = open_temp().await;
        let exact_title = track("never gonna give", "https://yt/a");
        let by_url = track("something else entirely", "https://yt/b");

        cache.store("never gonna give", exact_title).await;
        cache.store("other", by_url.clone()).await;

        let found = cache.lookup("never gonna give", Some("https://yt/b")).await;
        assert_eq!(found, Some(by_url));
    }

    #[tokio::test]
    async fn test_unknown_url_hint_falls_back_to_fuzzy() {
        let (_dir, cache) = open_temp().await;
        let song = track("Daft Punk - One More Time", "https://yt/omt");
        cache.store("one more time", song.clone()).await;

        let found = cache.lookup("one more time", Some("https://yt/missing")).await;
        assert_eq!(found, Some(song));
    }

    #[tokio::test]
    async fn test_same_url_updates_in_place() {
        let (dir, cache) = open_temp().await;

        cache.store("first query", track("Old Title", "https://yt/x")).await;
        cache.store("second query", track("New Title", "https://yt/x")).await;

        assert_eq!(cache.len().await, 1);

        // la clave original se conserva
        let content = std::fs::read_to_string(dir.path().join("songRepo.json")).unwrap();
        let table: CacheTable = serde_json::from_str(&content).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["first query"].title, "New Title");
    }

    #[tokio::test]
    async fn test_saved_file_uses_four_space_indent() {
        let (dir, cache) = open_temp().await;
        cache.store("song", track("Song", "https://yt/s")).await;

        let content = std::fs::read_to_string(dir.path().join("songRepo.json")).unwrap();
        assert_eq!(
            content,
            concat!(
                "{\n",
                "    \"song\": {\n",
                "        \"title\": \"Song\",\n",
                "        \"url\": \"https://yt/s\",\n",
                "        \"filePath\": \"/songs/Song.mp3\"\n",
                "    }\n",
                "}\n",
            )
        );
    }

    #[tokio::test]
    async fn test_empty_url_never_deduplicates() {
        let (_dir, cache) = open_temp().await;

        cache.store("one", track("Song One", "")).await;
        cache.store("two", track("Song Two", "")).await;

        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_unrelated_query_misses() {
        let (_dir, cache) = open_temp().await;
        cache.store("x", track("Totally Unrelated Song Title", "https://yt/u")).await;

        assert_eq!(cache.lookup("lofi beats", None).await, None);
    }

    #[tokio::test]
    async fn test_reopen_reads_persisted_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songRepo.json");
        let song = track("Rick Astley - Never Gonna Give You Up (Official Video)", "https://yt/rr");

        {
            let cache = SongCache::open(&path).await.unwrap();
            cache.store("never gonna give you up", song.clone()).await;
        }

        let reopened = SongCache::open(&path).await.unwrap();
        assert_eq!(reopened.lookup("Never Gonna Give You Up", None).await, Some(song));
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songRepo.json");
        std::fs::write(&path, "not json at all").unwrap();

        let cache = SongCache::open(&path).await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songRepo.json");
        let cache = SongCache::open(&path).await.unwrap();

        // Un directorio donde debería ir el archivo temporal hace fallar la escritura
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        let song = track("Bohemian Rhapsody", "https://yt/q");
        cache.store("bohemian rhapsody", song.clone()).await;

        assert_eq!(cache.lookup("bohemian rhapsody", None).await, Some(song));
    }
}
