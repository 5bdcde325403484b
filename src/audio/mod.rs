//! # Audio Module
//!
//! Per-guild playback for the jukebox.
//!
//! ## Architecture
//!
//! ### [`player`] - Playback Engine
//! - Registry of per-guild playback state
//! - enqueue / skip / stop / queue snapshot
//! - One supervised task per playing guild that walks the queue
//!
//! ### [`queue`] - Guild State
//! - FIFO of pending tracks, playing flag, stop token, voice handle
//! - All scheduling decisions are taken under the guild's own lock
//!
//! ### [`stream`] - Stream Worker
//! - Decodes one file on a blocking thread
//! - Emits one frame per frame duration, checking the stop token first
//!
//! ### [`decoder`] - PCM Decoder
//! - symphonia demux/decode, stereo remix, rubato resampling to 48kHz
//!
//! ### [`transport`] - Voice Transport
//! - The "accept frame" contract and its songbird implementation
//!
//! ## Audio Format
//!
//! - **Sample Rate**: 48kHz (Discord standard)
//! - **Bit Depth**: 16-bit signed integers
//! - **Channels**: Stereo (2 channels), interleaved
//! - **Frame**: 960 samples per channel (20ms) by default

pub mod decoder;
pub mod player;
pub mod queue;
pub mod stream;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use player::{EnqueueOutcome, PlaybackEngine, PlaybackEvent};
pub use stream::{StreamSettings, StreamWorker};
pub use transport::{SongbirdTransport, TransportError, VoiceTransport};

/// Output sample rate expected by the voice transport.
pub const SAMPLE_RATE: u32 = 48_000;

/// Output channel count expected by the voice transport.
pub const CHANNELS: usize = 2;

/// Samples per channel in a 20ms frame.
pub const DEFAULT_FRAME_SIZE: usize = 960;

/// Largest frame accepted (120ms, the longest Opus frame).
pub const MAX_FRAME_SIZE: usize = 5_760;
