//! Clock-driven audio backend
//!
//! Emulates a platform media element with a virtual media clock. The daemon
//! advances the clock in real time via [`ClockBackend::spawn_clock`]; tests
//! call [`ClockBackend::advance`] directly for deterministic playback.
//!
//! With an HTTP client attached, attaching a source issues a `HEAD` probe
//! (a failing probe reports a load error) and prefetching issues a ranged
//! `GET` for the first bytes of the file.

use super::{AudioBackend, BackendError, ResourceEvent, SourceToken, StartCause};
use crate::config::AutoplayPolicy;
use async_trait::async_trait;
use lectern_common::time::clamp_position;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bytes requested when warming an upcoming item
const PREFETCH_RANGE: &str = "bytes=0-65535";

#[derive(Debug)]
struct Source {
    token: SourceToken,
    url: String,
    duration: f64,
    position: f64,
    failed: Option<String>,
}

#[derive(Debug)]
struct ClockState {
    resource: bool,
    /// Sticky user activation (set by the first gesture-caused start)
    activated: bool,
    source: Option<Source>,
    playing: bool,
    rate: f64,
    volume: f64,
    muted: bool,
    /// Bumped by every pause and source swap; in-flight starts compare it
    pause_epoch: u64,
    pending_load_error: Option<String>,
    reject_next_start: bool,
    prefetched: Vec<String>,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            resource: false,
            activated: false,
            source: None,
            playing: false,
            rate: 1.0,
            volume: 1.0,
            muted: false,
            pause_epoch: 0,
            pending_load_error: None,
            reject_next_start: false,
            prefetched: Vec::new(),
        }
    }
}

/// Virtual-clock implementation of [`AudioBackend`]
pub struct ClockBackend {
    policy: AutoplayPolicy,
    state: Arc<Mutex<ClockState>>,
    events_tx: mpsc::UnboundedSender<ResourceEvent>,
    /// While `true`, `start()` parks until released
    hold_tx: watch::Sender<bool>,
    pending_starts: AtomicUsize,
    /// While `true`, `create_resource()` parks until released
    hold_create_tx: watch::Sender<bool>,
    pending_creations: AtomicUsize,
    http: Option<reqwest::Client>,
}

impl ClockBackend {
    /// Create a backend and the receiver for its resource events
    pub fn new(policy: AutoplayPolicy) -> (Arc<Self>, mpsc::UnboundedReceiver<ResourceEvent>) {
        Self::build(policy, None)
    }

    /// Same as [`ClockBackend::new`], probing sources and prefetching over HTTP
    pub fn with_http(
        policy: AutoplayPolicy,
        client: reqwest::Client,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ResourceEvent>) {
        Self::build(policy, Some(client))
    }

    fn build(
        policy: AutoplayPolicy,
        http: Option<reqwest::Client>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ResourceEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (hold_tx, _) = watch::channel(false);
        let (hold_create_tx, _) = watch::channel(false);
        let backend = Arc::new(Self {
            policy,
            state: Arc::new(Mutex::new(ClockState::default())),
            events_tx,
            hold_tx,
            pending_starts: AtomicUsize::new(0),
            hold_create_tx,
            pending_creations: AtomicUsize::new(0),
            http,
        });
        (backend, events_rx)
    }

    fn send(&self, event: ResourceEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("Resource event dropped: engine receiver closed");
        }
    }

    /// Advance the media clock by `seconds` of wall time
    ///
    /// Scaled by the playback rate. Emits one `TimeUpdate` per call while
    /// playing, followed by `Ended` when the end of the source is reached.
    pub async fn advance(&self, seconds: f64) {
        let mut state = self.state.lock().await;
        if !state.playing {
            return;
        }
        let rate = state.rate;

        let Some(source) = state.source.as_mut() else {
            return;
        };
        source.position += seconds * rate;
        let token = source.token;
        let ended = source.duration > 0.0 && source.position >= source.duration;
        if ended {
            source.position = source.duration;
        }
        let position = source.position;

        if ended {
            state.playing = false;
        }
        drop(state);

        self.send(ResourceEvent::TimeUpdate {
            token,
            current_time: position,
        });
        if ended {
            self.send(ResourceEvent::Ended { token });
        }
    }

    /// Drive the clock in real time until the engine goes away
    pub fn spawn_clock(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let backend = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("Media clock started ({} ms tick)", period.as_millis());

            loop {
                ticker.tick().await;
                if backend.events_tx.is_closed() {
                    break;
                }
                backend.advance(period.as_secs_f64()).await;
            }

            info!("Media clock stopped");
        })
    }

    fn spawn_probe(&self, client: reqwest::Client, token: SourceToken, url: String, duration: f64) {
        let state = Arc::clone(&self.state);
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let failure = match client.head(&url).send().await {
                Ok(resp) if resp.status().is_success() => None,
                Ok(resp) => Some(format!("HTTP {} for {}", resp.status(), url)),
                Err(e) => Some(format!("{}: {}", url, e)),
            };

            let event = match failure {
                None => ResourceEvent::Ready { token, duration },
                Some(message) => {
                    warn!("Source probe failed: {}", message);
                    let mut state = state.lock().await;
                    if let Some(source) = state.source.as_mut().filter(|s| s.token == token) {
                        source.failed = Some(message.clone());
                    }
                    ResourceEvent::Error { token, message }
                }
            };
            if tx.send(event).is_err() {
                debug!("Probe result for source {} dropped: engine receiver closed", token);
            }
        });
    }

    // ---- test hooks ----

    /// Park every subsequent `start()` until [`ClockBackend::release_starts`]
    pub fn hold_starts(&self) {
        self.hold_tx.send_replace(true);
    }

    pub fn release_starts(&self) {
        self.hold_tx.send_replace(false);
    }

    /// Number of `start()` calls currently parked
    pub fn pending_starts(&self) -> usize {
        self.pending_starts.load(Ordering::SeqCst)
    }

    /// Park every subsequent `create_resource()` until
    /// [`ClockBackend::release_creation`]
    pub fn hold_creation(&self) {
        self.hold_create_tx.send_replace(true);
    }

    pub fn release_creation(&self) {
        self.hold_create_tx.send_replace(false);
    }

    /// Number of `create_resource()` calls currently parked
    pub fn pending_creations(&self) -> usize {
        self.pending_creations.load(Ordering::SeqCst)
    }

    async fn park_while_held(hold: &watch::Sender<bool>, parked: &AtomicUsize) {
        if !*hold.borrow() {
            return;
        }
        parked.fetch_add(1, Ordering::SeqCst);
        let mut rx = hold.subscribe();
        let _ = rx.wait_for(|held| !*held).await;
        parked.fetch_sub(1, Ordering::SeqCst);
    }

    /// Make the next attached source fail to load
    pub async fn inject_load_error(&self, message: impl Into<String>) {
        self.state.lock().await.pending_load_error = Some(message.into());
    }

    /// Refuse the next `start()` as if the platform blocked it
    pub async fn reject_next_start(&self) {
        self.state.lock().await.reject_next_start = true;
    }

    /// Fail the current source mid-playback
    pub async fn fail_playback(&self, message: impl Into<String>) {
        let message = message.into();
        let mut state = self.state.lock().await;
        state.playing = false;
        let token = match state.source.as_mut() {
            Some(source) => {
                source.failed = Some(message.clone());
                source.token
            }
            None => return,
        };
        drop(state);
        self.send(ResourceEvent::Error { token, message });
    }

    pub async fn is_playing(&self) -> bool {
        self.state.lock().await.playing
    }

    pub async fn has_resource(&self) -> bool {
        self.state.lock().await.resource
    }

    pub async fn is_activated(&self) -> bool {
        self.state.lock().await.activated
    }

    pub async fn position(&self) -> Option<f64> {
        self.state.lock().await.source.as_ref().map(|s| s.position)
    }

    pub async fn current_url(&self) -> Option<String> {
        self.state.lock().await.source.as_ref().map(|s| s.url.clone())
    }

    pub async fn volume(&self) -> (f64, bool) {
        let state = self.state.lock().await;
        (state.volume, state.muted)
    }

    pub async fn playback_rate(&self) -> f64 {
        self.state.lock().await.rate
    }

    /// URLs handed to `prefetch()`, in call order
    pub async fn prefetched(&self) -> Vec<String> {
        self.state.lock().await.prefetched.clone()
    }
}

#[async_trait]
impl AudioBackend for ClockBackend {
    async fn create_resource(&self) -> Result<(), BackendError> {
        Self::park_while_held(&self.hold_create_tx, &self.pending_creations).await;
        let mut state = self.state.lock().await;
        if !state.resource {
            state.resource = true;
            info!("Playback resource created");
        }
        Ok(())
    }

    async fn set_source(
        &self,
        token: SourceToken,
        url: &str,
        duration_hint: f64,
        start_at: f64,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        if !state.resource {
            return Err(BackendError::NoResource);
        }

        state.playing = false;
        state.pause_epoch += 1;
        let failed = state.pending_load_error.take();
        let duration = duration_hint.max(0.0);
        state.source = Some(Source {
            token,
            url: url.to_string(),
            duration,
            position: clamp_position(start_at, duration),
            failed: failed.clone(),
        });
        drop(state);

        debug!("Source {} attached: {}", token, url);

        match (failed, &self.http) {
            (Some(message), _) => self.send(ResourceEvent::Error { token, message }),
            (None, Some(client)) => self.spawn_probe(client.clone(), token, url.to_string(), duration),
            (None, None) => self.send(ResourceEvent::Ready { token, duration }),
        }
        Ok(())
    }

    async fn start(&self, cause: StartCause) -> Result<(), BackendError> {
        let (token, epoch) = {
            let mut state = self.state.lock().await;
            if !state.resource {
                return Err(BackendError::NoResource);
            }
            let (token, failed) = match state.source.as_ref() {
                Some(source) => (source.token, source.failed.clone()),
                None => return Err(BackendError::Load("no source attached".to_string())),
            };
            if let Some(message) = failed {
                return Err(BackendError::Load(message));
            }
            if state.reject_next_start {
                state.reject_next_start = false;
                return Err(BackendError::AutoplayBlocked);
            }
            if self.policy == AutoplayPolicy::RequireGesture
                && !state.activated
                && cause == StartCause::Automatic
            {
                return Err(BackendError::AutoplayBlocked);
            }
            (token, state.pause_epoch)
        };

        Self::park_while_held(&self.hold_tx, &self.pending_starts).await;

        let mut state = self.state.lock().await;
        let still_current = state.pause_epoch == epoch
            && state.source.as_ref().map(|s| s.token) == Some(token);
        if !still_current {
            debug!("Start for source {} superseded", token);
            return Err(BackendError::Aborted);
        }

        if let Some(source) = state.source.as_mut() {
            if source.duration > 0.0 && source.position >= source.duration {
                source.position = 0.0;
            }
        }
        state.playing = true;
        if cause == StartCause::UserGesture {
            state.activated = true;
        }
        Ok(())
    }

    async fn pause(&self) {
        let mut state = self.state.lock().await;
        state.playing = false;
        state.pause_epoch += 1;
    }

    async fn set_current_time(&self, position: f64) {
        let mut state = self.state.lock().await;
        if let Some(source) = state.source.as_mut() {
            source.position = clamp_position(position, source.duration);
        }
    }

    async fn set_volume(&self, volume: f64) {
        self.state.lock().await.volume = volume;
    }

    async fn set_muted(&self, muted: bool) {
        self.state.lock().await.muted = muted;
    }

    async fn set_playback_rate(&self, rate: f64) {
        self.state.lock().await.rate = rate;
    }

    async fn prefetch(&self, url: &str) -> Result<(), BackendError> {
        self.state.lock().await.prefetched.push(url.to_string());

        if let Some(client) = self.http.clone() {
            let url = url.to_string();
            tokio::spawn(async move {
                match client
                    .get(&url)
                    .header(reqwest::header::RANGE, PREFETCH_RANGE)
                    .send()
                    .await
                {
                    Ok(resp) => debug!("Prefetched {} ({})", url, resp.status()),
                    Err(e) => debug!("Prefetch of {} failed: {}", url, e),
                }
            });
        }
        Ok(())
    }
}
