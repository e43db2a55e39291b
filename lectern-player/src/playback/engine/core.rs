//! Engine construction, shared state and item loading

use crate::backend::{AudioBackend, ResourceEvent, SourceToken};
use crate::config::PlaybackConfig;
use crate::playback::autoplay::AutoplayGate;
use lectern_common::events::{EventBus, LecternEvent, PlaybackSnapshot, PlaybackStatus};
use lectern_common::time::{clamp_position, format_seconds};
use lectern_common::Item;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

/// Engine tunables taken from `[playback]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub skip_forward_secs: f64,
    pub skip_backward_secs: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for EngineSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            skip_forward_secs: config.skip_forward_secs,
            skip_backward_secs: config.skip_backward_secs,
        }
    }
}

/// Options for [`PlaybackEngine::load`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadOptions {
    /// Initial position (seconds), clamped to the item duration
    pub resume_at: Option<f64>,
    /// Attempt an automatic start once loaded (suppressed while the gate is closed)
    pub autoplay: bool,
}

/// Mutable engine state, guarded by one lock that is never held across a
/// backend call
#[derive(Debug)]
pub(super) struct EngineInner {
    pub(super) status: PlaybackStatus,
    pub(super) item: Option<Item>,
    /// Token of the source the engine currently expects events from
    pub(super) token: SourceToken,
    /// Bumped by every load and pause; in-flight starts compare it
    pub(super) epoch: u64,
    pub(super) resource_created: bool,
    /// Whether the backend has the source for `token`
    pub(super) source_attached: bool,
    pub(super) pending_starts: u32,
    pub(super) buffering: bool,
    pub(super) current_time: f64,
    pub(super) duration: f64,
    pub(super) volume: f64,
    pub(super) playback_rate: f64,
    pub(super) muted: bool,
    pub(super) last_error: Option<String>,
}

impl EngineInner {
    fn new() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            item: None,
            token: SourceToken::default(),
            epoch: 0,
            resource_created: false,
            source_attached: false,
            pending_starts: 0,
            buffering: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            playback_rate: 1.0,
            muted: false,
            last_error: None,
        }
    }

    pub(super) fn item_id(&self) -> Option<String> {
        self.item.as_ref().map(|item| item.id.clone())
    }

    pub(super) fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            item_id: self.item_id(),
            status: self.status,
            current_time: self.current_time,
            duration: self.duration,
            volume: self.volume,
            playback_rate: self.playback_rate,
            is_muted: self.muted,
            is_playing: self.status == PlaybackStatus::Playing,
            is_loading: self.status == PlaybackStatus::Loading || self.buffering,
            has_error: self.status == PlaybackStatus::Error,
            error_message: self.last_error.clone(),
        }
    }
}

/// The single playback engine of a session
///
/// Owns the playback resource (through the [`AudioBackend`]) and the one
/// observable [`PlaybackSnapshot`]. Views read the snapshot through
/// [`PlaybackEngine::subscribe_state`] and drive the engine through its
/// control methods; none of the control methods fail.
pub struct PlaybackEngine {
    pub(super) backend: Arc<dyn AudioBackend>,
    pub(super) gate: Arc<AutoplayGate>,
    pub(super) inner: Mutex<EngineInner>,
    /// Serializes source changes (load, lazy creation, error recovery)
    pub(super) source_lock: Mutex<()>,
    pub(super) snapshot_tx: watch::Sender<PlaybackSnapshot>,
    pub(super) events: EventBus,
    /// Taken once by the event loop (or drained by `pump_events`)
    pub(super) resource_rx: Mutex<Option<mpsc::UnboundedReceiver<ResourceEvent>>>,
    pub(super) settings: EngineSettings,
}

impl PlaybackEngine {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        resource_rx: mpsc::UnboundedReceiver<ResourceEvent>,
        gate: Arc<AutoplayGate>,
        events: EventBus,
        settings: EngineSettings,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(PlaybackSnapshot::default());
        Self {
            backend,
            gate,
            inner: Mutex::new(EngineInner::new()),
            source_lock: Mutex::new(()),
            snapshot_tx,
            events,
            resource_rx: Mutex::new(Some(resource_rx)),
            settings,
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver that always holds the latest snapshot
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn gate(&self) -> &Arc<AutoplayGate> {
        &self.gate
    }

    pub async fn current_item(&self) -> Option<Item> {
        self.inner.lock().await.item.clone()
    }

    /// Load `item`, replacing whatever is loaded
    ///
    /// Loading the item that is already loaded is a no-op (returns `false`).
    /// Otherwise the current resource is paused, the source swapped, and the
    /// position reset to 0 or `options.resume_at`. Volume, rate and mute
    /// carry over. Without a resource the engine goes straight to `Ready`
    /// using the item's metadata duration.
    pub async fn load(&self, item: Item, options: LoadOptions) -> bool {
        {
            let _serial = self.source_lock.lock().await;

            let (token, start_at, attach) = {
                let mut inner = self.inner.lock().await;
                if inner.item.as_ref().is_some_and(|current| current.id == item.id) {
                    debug!("Item {} already loaded, ignoring load", item.id);
                    return false;
                }

                inner.epoch += 1;
                inner.token = inner.token.next();
                inner.duration = item.duration_seconds.max(0.0);
                let start_at = clamp_position(options.resume_at.unwrap_or(0.0), inner.duration);
                inner.current_time = start_at;
                inner.last_error = None;
                inner.buffering = false;
                inner.source_attached = false;
                inner.item = Some(item.clone());

                let next = if inner.resource_created {
                    PlaybackStatus::Loading
                } else {
                    PlaybackStatus::Ready
                };
                self.set_status(&mut inner, next);
                self.publish(&inner);
                (inner.token, start_at, inner.resource_created)
            };

            info!(
                "Loaded item {} \"{}\" at {} (source {})",
                item.id,
                item.title,
                format_seconds(start_at),
                token
            );
            self.events.emit_lossy(LecternEvent::ItemChanged {
                item_id: item.id.clone(),
                start_at,
                duration: item.duration_seconds,
                timestamp: chrono::Utc::now(),
            });

            if attach {
                self.backend.pause().await;
                match self
                    .backend
                    .set_source(token, &item.audio_url, item.duration_seconds, start_at)
                    .await
                {
                    Ok(()) => self.mark_attached(token).await,
                    Err(e) => self.fail(token, e.to_string()).await,
                }
            }
        }

        if options.autoplay {
            self.autoplay().await;
        }
        true
    }

    /// Automatic start attempt, suppressed while no user interaction happened
    pub async fn autoplay(&self) -> bool {
        if !self.gate.allows_automatic_start() {
            if let Some(item_id) = self.inner.lock().await.item_id() {
                debug!("Automatic playback of {} suppressed: no user interaction yet", item_id);
                self.events.emit_lossy(LecternEvent::AutoplaySuppressed {
                    item_id,
                    timestamp: chrono::Utc::now(),
                });
            }
            return false;
        }
        self.start_playback(crate::backend::StartCause::Automatic).await
    }

    /// Publish the snapshot derived from `inner`
    pub(super) fn publish(&self, inner: &EngineInner) {
        self.snapshot_tx.send_replace(inner.snapshot());
    }

    /// Move the state machine, emitting `PlaybackStateChanged` on change
    pub(super) fn set_status(&self, inner: &mut EngineInner, new_status: PlaybackStatus) {
        let old_status = inner.status;
        if old_status == new_status {
            return;
        }
        inner.status = new_status;
        debug!("Playback status {} -> {}", old_status, new_status);
        self.events.emit_lossy(LecternEvent::PlaybackStateChanged {
            item_id: inner.item_id(),
            old_status,
            new_status,
            timestamp: chrono::Utc::now(),
        });
    }

    pub(super) async fn mark_attached(&self, token: SourceToken) {
        let mut inner = self.inner.lock().await;
        if inner.token == token {
            inner.source_attached = true;
        }
    }

    /// Put the engine in `Error` for `token` (ignored if superseded)
    pub(super) async fn fail(&self, token: SourceToken, message: String) {
        let mut inner = self.inner.lock().await;
        if inner.token != token {
            debug!("Ignoring failure of superseded source {}: {}", token, message);
            return;
        }

        warn!("Playback error: {}", message);
        inner.last_error = Some(message.clone());
        inner.buffering = false;
        self.set_status(&mut inner, PlaybackStatus::Error);
        self.publish(&inner);
        self.events.emit_lossy(LecternEvent::PlaybackError {
            item_id: inner.item_id(),
            message,
            timestamp: chrono::Utc::now(),
        });
    }
}
