//! Per-guild Discord music queue backed by a fuzzy song cache.
//!
//! - [`audio`]: playback engine, stream worker, decoder and voice transport
//! - [`cache`]: durable query-to-file cache with fuzzy title matching
//! - [`sources`]: query resolution and downloads through yt-dlp
//! - [`jukebox`]: the resolve / cache / download / enqueue pipeline
//! - [`bot`]: serenity event handler and slash commands

pub mod audio;
pub mod bot;
pub mod cache;
pub mod config;
pub mod jukebox;
pub mod sources;
pub mod track;
