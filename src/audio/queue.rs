use std::{collections::VecDeque, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::VoiceTransport;
use crate::track::TrackDescriptor;

/// Everything the guild loop needs to stream one track.
pub struct Dispatch {
    pub track: TrackDescriptor,
    pub cancel: CancellationToken,
    pub voice: Arc<dyn VoiceTransport>,
    /// Generation of the guild state this dispatch belongs to.
    pub epoch: u64,
}

/// Decision taken after a track ends.
pub enum Advance {
    /// Keep looping with the next track.
    Next(Dispatch),
    /// Queue exhausted; the guild is idle.
    Idle,
    /// The voice handle stopped accepting frames. It was dropped and the
    /// waiting tracks stay queued for the next one.
    VoiceLost { waiting: usize },
    /// A stop happened while the track was streaming; this loop must exit
    /// without touching the state again.
    Superseded,
}

/// Per-guild playback state. Every method runs under the guild's lock.
pub struct GuildState {
    queue: VecDeque<TrackDescriptor>,
    current: Option<TrackDescriptor>,
    playing: bool,
    cancel: CancellationToken,
    voice: Option<Arc<dyn VoiceTransport>>,
    epoch: u64,
}

impl Default for GuildState {
    fn default() -> Self {
        Self::new()
    }
}

impl GuildState {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            playing: false,
            cancel: CancellationToken::new(),
            voice: None,
            epoch: 0,
        }
    }

    /// Appends a track and returns its 1-based position.
    pub fn push(&mut self, track: TrackDescriptor) -> usize {
        self.queue.push_back(track);
        self.queue.len()
    }

    /// Dequeues the next track if the guild can start playing.
    ///
    /// Does nothing while already playing or without a voice handle. On an
    /// empty queue it just marks the guild idle.
    pub fn try_start(&mut self) -> Option<Dispatch> {
        if self.playing {
            return None;
        }
        let voice = self.voice.clone()?;

        let Some(track) = self.queue.pop_front() else {
            self.playing = false;
            return None;
        };

        self.playing = true;
        self.cancel = CancellationToken::new();
        self.current = Some(track.clone());

        Some(Dispatch {
            track,
            cancel: self.cancel.clone(),
            voice,
            epoch: self.epoch,
        })
    }

    /// Called by the guild loop once the track from `epoch` has ended.
    pub fn advance(&mut self, epoch: u64) -> Advance {
        if epoch != self.epoch {
            return Advance::Superseded;
        }

        self.playing = false;
        self.current = None;

        match self.try_start() {
            Some(dispatch) => Advance::Next(dispatch),
            None => Advance::Idle,
        }
    }

    /// Called by the guild loop when `voice` refused a frame.
    ///
    /// A handle that was already replaced by a newer one is left alone and
    /// the loop just advances.
    pub fn detach_voice(&mut self, epoch: u64, voice: &Arc<dyn VoiceTransport>) -> Advance {
        if epoch != self.epoch {
            return Advance::Superseded;
        }

        let still_current = self
            .voice
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, voice));
        if !still_current {
            return self.advance(epoch);
        }

        self.voice = None;
        self.playing = false;
        self.current = None;
        Advance::VoiceLost {
            waiting: self.queue.len(),
        }
    }

    /// Signals the active track to stop. False when nothing is playing.
    pub fn skip(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Clears the queue, cancels the active track and drops the voice handle.
    pub fn stop(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        self.cancel.cancel();
        self.voice = None;
        self.current = None;
        self.playing = false;
        self.epoch += 1;
        debug!("Estado reiniciado ({} pistas descartadas)", dropped);
    }

    pub fn set_voice(&mut self, voice: Arc<dyn VoiceTransport>) {
        self.voice = Some(voice);
    }

    pub fn snapshot(&self) -> Vec<TrackDescriptor> {
        self.queue.iter().cloned().collect()
    }

    pub fn current(&self) -> Option<&TrackDescriptor> {
        self.current.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
