use async_trait::async_trait;
use songbird::{
    input::{Input, RawAdapter},
    tracks::TrackHandle,
    Call,
};
use std::{
    io::{self, Read, Seek, SeekFrom},
    sync::Arc,
};
use symphonia::core::io::MediaSource;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{CHANNELS, DEFAULT_FRAME_SIZE, SAMPLE_RATE};

/// Frames buffered between the stream worker and the voice mixer (~0.5s).
const PIPE_CAPACITY: usize = 25;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("voice connection closed")]
    Closed,
}

/// Sink for paced PCM frames, one per guild voice connection.
///
/// Frames are interleaved 48kHz stereo i16. Callers are responsible for
/// pacing; implementations may apply backpressure by awaiting.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn send_frame(&self, pcm: &[i16]) -> Result<(), TransportError>;
}

/// Feeds frames into a songbird call through one long-lived raw track.
pub struct SongbirdTransport {
    frames: flume::Sender<Vec<i16>>,
    track: TrackHandle,
}

impl SongbirdTransport {
    /// Starts the raw PCM track on `call`.
    pub async fn attach(call: Arc<Mutex<Call>>) -> Self {
        let (frames, receiver) = flume::bounded(PIPE_CAPACITY);
        let pipe = PcmPipe::new(receiver);
        let input: Input = RawAdapter::new(pipe, SAMPLE_RATE, CHANNELS as u32).into();

        let track = {
            let mut handler = call.lock().await;
            handler.play_input(input)
        };

        info!("🔌 Transporte de voz conectado");
        Self { frames, track }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn send_frame(&self, pcm: &[i16]) -> Result<(), TransportError> {
        self.frames
            .send_async(pcm.to_vec())
            .await
            .map_err(|_| TransportError::Closed)
    }
}

impl Drop for SongbirdTransport {
    fn drop(&mut self) {
        let _ = self.track.stop();
        debug!("Transporte de voz liberado");
    }
}

/// Byte stream of little-endian f32 samples read by songbird's mixer.
///
/// When no frame is waiting the pipe yields one frame of silence instead of
/// blocking, so an idle guild never stalls the mixer thread.
struct PcmPipe {
    frames: flume::Receiver<Vec<i16>>,
    buffer: Vec<u8>,
    position: usize,
}

impl PcmPipe {
    fn new(frames: flume::Receiver<Vec<i16>>) -> Self {
        Self {
            frames,
            buffer: Vec::new(),
            position: 0,
        }
    }

    fn refill(&mut self) -> bool {
        self.buffer.clear();
        self.position = 0;

        match self.frames.try_recv() {
            Ok(frame) => {
                for sample in frame {
                    let value = sample as f32 / i16::MAX as f32;
                    self.buffer.extend_from_slice(&value.to_le_bytes());
                }
                true
            }
            Err(flume::TryRecvError::Empty) => {
                self.buffer
                    .resize(DEFAULT_FRAME_SIZE * CHANNELS * std::mem::size_of::<f32>(), 0);
                true
            }
            Err(flume::TryRecvError::Disconnected) => false,
        }
    }
}

impl Read for PcmPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.buffer.len() && !self.refill() {
            return Ok(0);
        }

        let available = &self.buffer[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

impl Seek for PcmPipe {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "live PCM pipe cannot seek",
        ))
    }
}

impl MediaSource for PcmPipe {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}
