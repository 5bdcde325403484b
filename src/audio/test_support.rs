//! Fixtures shared by the audio tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;

use super::transport::{TransportError, VoiceTransport};

/// Writes a 16-bit PCM WAV file holding a 440Hz tone.
pub(crate) fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: u32) {
    let bits_per_sample: u16 = 16;
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = frames * block_align as u32;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());

    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = ((t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16;
        for _ in 0..channels {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    std::fs::write(path, bytes).unwrap();
}

/// Transport that keeps every frame it receives.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    frames: Mutex<Vec<Vec<i16>>>,
    closed: bool,
}

impl RecordingTransport {
    pub(crate) fn closed() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            closed: true,
        }
    }

    pub(crate) fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub(crate) fn frames(&self) -> Vec<Vec<i16>> {
        self.frames.lock().clone()
    }
}

#[async_trait]
impl VoiceTransport for RecordingTransport {
    async fn send_frame(&self, pcm: &[i16]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.frames.lock().push(pcm.to_vec());
        Ok(())
    }
}
