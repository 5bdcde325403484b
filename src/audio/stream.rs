use std::{path::PathBuf, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    decoder::{DecodeError, PcmDecoder},
    transport::{TransportError, VoiceTransport},
    DEFAULT_FRAME_SIZE, SAMPLE_RATE,
};
use crate::track::TrackDescriptor;

/// Frames decoded ahead of the pacing loop.
const DECODE_AHEAD: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Samples per channel in each emitted frame.
    pub frame_size: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
        }
    }
}

impl StreamSettings {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_micros(self.frame_size as u64 * 1_000_000 / SAMPLE_RATE as u64)
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("decoder thread panicked")]
    Panicked,
}

/// How a single track's stream ended.
#[derive(Debug)]
pub enum StreamOutcome {
    /// End of file reached, every frame delivered.
    Finished { frames: u64 },
    /// Stop token fired; nothing was emitted after it was observed.
    Cancelled { frames: u64 },
    Failed(StreamError),
}

impl StreamOutcome {
    pub fn frames(&self) -> u64 {
        match self {
            Self::Finished { frames } | Self::Cancelled { frames } => *frames,
            Self::Failed(_) => 0,
        }
    }
}

/// Streams one track to a voice transport at real-time pace.
///
/// Decoding happens on a blocking thread and feeds a small bounded channel;
/// the async side emits one frame per [`StreamSettings::frame_duration`] and
/// checks the stop token before every frame.
pub struct StreamWorker {
    track: TrackDescriptor,
    settings: StreamSettings,
}

impl StreamWorker {
    pub fn new(track: TrackDescriptor, settings: StreamSettings) -> Self {
        Self { track, settings }
    }

    pub async fn run(
        self,
        transport: Arc<dyn VoiceTransport>,
        cancel: CancellationToken,
    ) -> StreamOutcome {
        if cancel.is_cancelled() {
            debug!("⏭️ Stream cancelado antes de empezar: {}", self.track.title);
            return StreamOutcome::Cancelled { frames: 0 };
        }

        let (frames_tx, frames_rx) = flume::bounded(DECODE_AHEAD);
        let path = self.track.file_path.clone();
        let frame_size = self.settings.frame_size;
        let decode_cancel = cancel.clone();

        let decode = tokio::task::spawn_blocking(move || {
            decode_into(path, frame_size, frames_tx, decode_cancel)
        });

        let mut outcome = pump(
            frames_rx,
            transport.as_ref(),
            &cancel,
            self.settings.frame_duration(),
        )
        .await;

        // el receptor ya se soltó: el hilo de decodificación termina en su próximo envío
        if let Err(e) = decode.await {
            if e.is_panic() {
                error!("💥 El decodificador entró en pánico: {}", self.track.title);
                if matches!(outcome, StreamOutcome::Finished { .. }) {
                    outcome = StreamOutcome::Failed(StreamError::Panicked);
                }
            }
        }

        match &outcome {
            StreamOutcome::Finished { frames } => {
                info!("✅ Terminó: {} ({} frames)", self.track.title, frames)
            }
            StreamOutcome::Cancelled { frames } => {
                info!("⏹️ Detenido: {} ({} frames)", self.track.title, frames)
            }
            StreamOutcome::Failed(e) => warn!("⚠️ Falló {}: {}", self.track.title, e),
        }

        outcome
    }
}

type FrameResult = Result<Vec<i16>, DecodeError>;

fn decode_into(
    path: PathBuf,
    frame_size: usize,
    frames: flume::Sender<FrameResult>,
    cancel: CancellationToken,
) {
    let mut decoder = match PcmDecoder::open(&path, frame_size) {
        Ok(decoder) => decoder,
        Err(e) => {
            let _ = frames.send(Err(e));
            return;
        }
    };

    while !cancel.is_cancelled() {
        match decoder.next_frame() {
            Ok(Some(frame)) => {
                if frames.send(Ok(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = frames.send(Err(e));
                break;
            }
        }
    }
}

async fn pump(
    frames: flume::Receiver<FrameResult>,
    transport: &dyn VoiceTransport,
    cancel: &CancellationToken,
    frame_duration: Duration,
) -> StreamOutcome {
    let mut ticker = interval(frame_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled { frames: sent },
            next = frames.recv_async() => next,
        };

        let pcm = match next {
            Ok(Ok(pcm)) => pcm,
            Ok(Err(e)) => return StreamOutcome::Failed(e.into()),
            Err(_) => return StreamOutcome::Finished { frames: sent },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled { frames: sent },
            _ = ticker.tick() => {}
        }

        if cancel.is_cancelled() {
            return StreamOutcome::Cancelled { frames: sent };
        }

        if let Err(e) = transport.send_frame(&pcm).await {
            return StreamOutcome::Failed(e.into());
        }
        sent += 1;
    }
}
