//! Audio backend abstraction
//!
//! The engine never talks to an audio device directly. It drives an
//! [`AudioBackend`] (the platform's media element) and listens to the
//! [`ResourceEvent`]s the backend pushes on an unbounded channel.
//!
//! Every source attached to the backend is tagged with a [`SourceToken`];
//! the backend stamps each event with the token of the source that produced
//! it so the engine can discard events from a superseded load.

mod clock;

pub use clock::ClockBackend;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Load generation attached to a source and to every event it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct SourceToken(pub u64);

impl SourceToken {
    pub fn next(self) -> Self {
        SourceToken(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for SourceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What caused a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartCause {
    /// Direct result of a user control invocation
    UserGesture,
    /// Item selection, continuation or any other programmatic start
    Automatic,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Platform refused to start playback without a user gesture
    #[error("playback start blocked by autoplay policy")]
    AutoplayBlocked,

    /// Start superseded by a newer source or a pause
    #[error("playback start aborted")]
    Aborted,

    /// Source could not be loaded or decoded
    #[error("failed to load source: {0}")]
    Load(String),

    /// Operation needs a resource that was never created
    #[error("no playback resource")]
    NoResource,
}

/// Notification pushed by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    /// Metadata known, source can play
    Ready { token: SourceToken, duration: f64 },
    TimeUpdate { token: SourceToken, current_time: f64 },
    Buffering { token: SourceToken, buffering: bool },
    Ended { token: SourceToken },
    Error { token: SourceToken, message: String },
}

impl ResourceEvent {
    pub fn token(&self) -> SourceToken {
        match self {
            ResourceEvent::Ready { token, .. }
            | ResourceEvent::TimeUpdate { token, .. }
            | ResourceEvent::Buffering { token, .. }
            | ResourceEvent::Ended { token }
            | ResourceEvent::Error { token, .. } => *token,
        }
    }
}

/// Platform playback resource
///
/// Exactly one backend exists per player context. Implementations must be
/// cheap to call concurrently: the engine never holds its own state lock
/// while awaiting any of these methods.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Create the underlying resource (first user-caused play only)
    async fn create_resource(&self) -> Result<(), BackendError>;

    /// Swap the source, pausing whatever was playing
    ///
    /// Readiness or failure is reported later through [`ResourceEvent`]s
    /// carrying `token`.
    async fn set_source(
        &self,
        token: SourceToken,
        url: &str,
        duration_hint: f64,
        start_at: f64,
    ) -> Result<(), BackendError>;

    /// Start playback of the current source
    ///
    /// Resolves once the platform confirmed (or refused) the start.
    async fn start(&self, cause: StartCause) -> Result<(), BackendError>;

    async fn pause(&self);

    async fn set_current_time(&self, position: f64);

    async fn set_volume(&self, volume: f64);

    async fn set_muted(&self, muted: bool);

    async fn set_playback_rate(&self, rate: f64);

    /// Warm the cache for `url` without touching the current source
    async fn prefetch(&self, url: &str) -> Result<(), BackendError>;
}
