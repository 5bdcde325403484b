use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{
    queue::{Advance, Dispatch, GuildState},
    stream::{StreamError, StreamOutcome, StreamSettings, StreamWorker},
    transport::VoiceTransport,
};
use crate::track::TrackDescriptor;

/// How long [`PlaybackEngine::shutdown`] waits for guild loops to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// This call started playback of the track.
    Started,
    /// The track waits at this 1-based position (1 plays next).
    Queued { position: usize },
}

#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    TrackStarted {
        guild_id: GuildId,
        track: TrackDescriptor,
    },
    TrackFinished {
        guild_id: GuildId,
        track: TrackDescriptor,
        skipped: bool,
    },
    TrackFailed {
        guild_id: GuildId,
        track: TrackDescriptor,
        error: String,
    },
    QueueDrained {
        guild_id: GuildId,
    },
    /// The voice handle closed; waiting tracks resume on the next one.
    VoiceLost {
        guild_id: GuildId,
        waiting: usize,
    },
}

/// Playback state of one guild plus the handle of its loop task.
#[derive(Default)]
pub struct GuildPlayback {
    state: Mutex<GuildState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Lazily populated map of guild playback states.
#[derive(Default)]
pub struct GuildRegistry {
    guilds: DashMap<GuildId, Arc<GuildPlayback>>,
}

impl GuildRegistry {
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayback> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Nuevo estado de reproducción para guild {}", guild_id);
                Arc::new(GuildPlayback::default())
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayback>> {
        self.guilds.get(&guild_id).map(|g| g.clone())
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildPlayback>> {
        self.guilds.remove(&guild_id).map(|(_, g)| g)
    }

    pub fn drain(&self) -> Vec<(GuildId, Arc<GuildPlayback>)> {
        let ids: Vec<GuildId> = self.guilds.iter().map(|g| *g.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.remove(id).map(|g| (id, g)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }
}

struct EngineInner {
    guilds: GuildRegistry,
    settings: StreamSettings,
    events: broadcast::Sender<PlaybackEvent>,
}

/// Per-guild playback queues and their streaming loops.
///
/// Each playing guild owns one tokio task that streams the current track,
/// then asks the guild state for the next one. The guild lock is only held
/// for those decisions, never while audio is streaming. Cloning is cheap and
/// shares the same engine.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    pub fn new(settings: StreamSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(EngineInner {
                guilds: GuildRegistry::default(),
                settings,
                events,
            }),
        }
    }

    /// Adds a track to the guild queue, starting playback when the guild is
    /// idle and has a voice handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, guild_id: GuildId, track: TrackDescriptor) -> EnqueueOutcome {
        let guild = self.inner.guilds.get_or_create(guild_id);

        let title = track.title.clone();
        let (outcome, dispatch) = {
            let mut state = guild.state.lock();
            let position = state.push(track);
            match state.try_start() {
                Some(dispatch) => (EnqueueOutcome::Started, Some(dispatch)),
                None => (EnqueueOutcome::Queued { position }, None),
            }
        };

        match &outcome {
            EnqueueOutcome::Started => info!("▶️ Iniciando reproducción en guild {}", guild_id),
            EnqueueOutcome::Queued { position } => {
                info!("➕ En cola (posición {}): {}", position, title)
            }
        }

        if let Some(dispatch) = dispatch {
            self.spawn_guild_loop(guild_id, guild, dispatch);
        }

        outcome
    }

    /// Stops the current track so the loop moves on. False when idle.
    pub fn request_skip(&self, guild_id: GuildId) -> bool {
        let skipped = self.with_state(guild_id, GuildState::skip).unwrap_or(false);

        if skipped {
            info!("⏭️ Saltando canción en guild {}", guild_id);
        }
        skipped
    }

    /// Clears the queue, stops the current track and forgets the voice handle.
    pub fn request_stop(&self, guild_id: GuildId) {
        if let Some(guild) = self.inner.guilds.get(guild_id) {
            guild.state.lock().stop();
            info!("⏹️ Reproducción detenida en guild {}", guild_id);
        }
    }

    pub fn snapshot_queue(&self, guild_id: GuildId) -> Vec<TrackDescriptor> {
        self.with_state(guild_id, |state| state.snapshot())
            .unwrap_or_default()
    }

    /// Records the guild's voice handle and starts any waiting track.
    ///
    /// Returns whether playback started.
    pub fn on_voice_ready(&self, guild_id: GuildId, voice: Arc<dyn VoiceTransport>) -> bool {
        let guild = self.inner.guilds.get_or_create(guild_id);

        let dispatch = {
            let mut state = guild.state.lock();
            state.set_voice(voice);
            state.try_start()
        };

        info!("🔊 Voz lista en guild {}", guild_id);

        match dispatch {
            Some(dispatch) => {
                self.spawn_guild_loop(guild_id, guild, dispatch);
                true
            }
            None => false,
        }
    }

    pub fn now_playing(&self, guild_id: GuildId) -> Option<TrackDescriptor> {
        self.with_state(guild_id, |state| state.current().cloned())
            .flatten()
    }

    pub fn is_playing(&self, guild_id: GuildId) -> bool {
        self.with_state(guild_id, |state| state.is_playing())
            .unwrap_or(false)
    }

    pub fn has_voice(&self, guild_id: GuildId) -> bool {
        self.with_state(guild_id, |state| state.has_voice())
            .unwrap_or(false)
    }

    pub fn guild_count(&self) -> usize {
        self.inner.guilds.len()
    }

    /// Stops the guild and forgets its state, for when the bot leaves it.
    pub fn remove_guild(&self, guild_id: GuildId) {
        if let Some(guild) = self.inner.guilds.remove(guild_id) {
            guild.state.lock().stop();
            debug!("Guild {} eliminado del registro", guild_id);
        }
    }

    /// Stops every guild and waits briefly for their loops to exit.
    pub async fn shutdown(&self) {
        let guilds = self.inner.guilds.drain();
        info!("🛑 Deteniendo {} guilds", guilds.len());

        let handles: Vec<JoinHandle<()>> = guilds
            .into_iter()
            .filter_map(|(_, guild)| {
                guild.state.lock().stop();
                let handle = guild.worker.lock().take();
                handle
            })
            .collect();

        let wait = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(SHUTDOWN_GRACE, wait).await.is_err() {
            warn!("⚠️ Algunas tareas de reproducción no terminaron a tiempo");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    /// Runs `f` under the lock of an existing guild without creating one.
    fn with_state<R>(&self, guild_id: GuildId, f: impl FnOnce(&mut GuildState) -> R) -> Option<R> {
        let guild = self.inner.guilds.get(guild_id)?;
        let mut state = guild.state.lock();
        Some(f(&mut *state))
    }

    fn emit(&self, event: PlaybackEvent) {
        // sin suscriptores no es un error
        let _ = self.inner.events.send(event);
    }

    fn spawn_guild_loop(&self, guild_id: GuildId, guild: Arc<GuildPlayback>, first: Dispatch) {
        let mut worker = guild.worker.lock();
        let previous = worker.take();
        let engine = self.clone();
        let loop_guild = guild.clone();

        *worker = Some(tokio::spawn(async move {
            // un bucle anterior (detenido) termina antes de que empiece este
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            engine.run_guild(guild_id, loop_guild, first).await;
        }));
    }

    async fn run_guild(&self, guild_id: GuildId, guild: Arc<GuildPlayback>, first: Dispatch) {
        let mut dispatch = first;

        loop {
            let epoch = dispatch.epoch;
            let voice = dispatch.voice.clone();
            let voice_lost = self.play_one(guild_id, dispatch).await;

            let next = {
                let mut state = guild.state.lock();
                if voice_lost {
                    state.detach_voice(epoch, &voice)
                } else {
                    state.advance(epoch)
                }
            };
            match next {
                Advance::Next(next) => dispatch = next,
                Advance::Idle => {
                    info!("📭 Cola terminada en guild {}", guild_id);
                    self.emit(PlaybackEvent::QueueDrained { guild_id });
                    break;
                }
                Advance::VoiceLost { waiting } => {
                    warn!(
                        "🔌 Conexión de voz perdida en guild {} ({} pistas en espera)",
                        guild_id, waiting
                    );
                    self.emit(PlaybackEvent::VoiceLost { guild_id, waiting });
                    break;
                }
                Advance::Superseded => {
                    debug!("Bucle de guild {} reemplazado tras detener", guild_id);
                    break;
                }
            }
        }
    }

    /// Streams one track and reports whether its voice handle closed.
    async fn play_one(&self, guild_id: GuildId, dispatch: Dispatch) -> bool {
        let Dispatch {
            track,
            cancel,
            voice,
            ..
        } = dispatch;

        info!("🎵 Reproduciendo: {}", track.title);
        self.emit(PlaybackEvent::TrackStarted {
            guild_id,
            track: track.clone(),
        });

        let worker = StreamWorker::new(track.clone(), self.inner.settings);
        let outcome = match tokio::spawn(worker.run(voice, cancel)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("💥 La tarea de stream falló en guild {}: {}", guild_id, e);
                StreamOutcome::Failed(StreamError::Panicked)
            }
        };

        let voice_lost = matches!(outcome, StreamOutcome::Failed(StreamError::Transport(_)));

        let event = match outcome {
            StreamOutcome::Finished { .. } => PlaybackEvent::TrackFinished {
                guild_id,
                track,
                skipped: false,
            },
            StreamOutcome::Cancelled { .. } => PlaybackEvent::TrackFinished {
                guild_id,
                track,
                skipped: true,
            },
            StreamOutcome::Failed(e) => {
                warn!("⚠️ Pista omitida por error: {}", track.title);
                PlaybackEvent::TrackFailed {
                    guild_id,
                    track,
                    error: e.to_string(),
                }
            }
        };
        self.emit(event);
        voice_lost
    }
}
