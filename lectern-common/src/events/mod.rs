//! Event types for the Lectern event system
//!
//! Provides the shared event definitions and the EventBus used by the
//! player and every attached view.

mod playback_types;

pub use playback_types::{PlaybackSnapshot, PlaybackStatus, ScrollBehavior, ScrollBlock, TextSize};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lectern event types
///
/// Broadcast via [`EventBus`] and serialized as-is for SSE transmission.
/// Every variant carries the id of the item it refers to where one exists,
/// so observers can drop events for items that are no longer active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LecternEvent {
    /// Engine state machine transition
    PlaybackStateChanged {
        item_id: Option<String>,
        old_status: PlaybackStatus,
        new_status: PlaybackStatus,
        timestamp: DateTime<Utc>,
    },

    /// A different item was loaded into the engine
    ///
    /// Triggers:
    /// - Progress Tracker: reset last written time to `start_at`
    /// - Segment Synchronizer: fetch read-along data for the new item
    /// - Preloader: recompute upcoming items
    ItemChanged {
        item_id: String,
        /// Resume offset the item was loaded at (seconds)
        start_at: f64,
        duration: f64,
        timestamp: DateTime<Utc>,
    },

    /// Playback position advanced
    ///
    /// Emitted for every resource time update; consumers throttle on their own.
    TimeUpdate {
        item_id: String,
        current_time: f64,
        duration: f64,
        timestamp: DateTime<Utc>,
    },

    /// Item played to the end
    PlaybackEnded {
        item_id: String,
        duration: f64,
        timestamp: DateTime<Utc>,
    },

    /// Resource failed to load or play
    PlaybackError {
        item_id: Option<String>,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Platform refused to start playback
    AutoplayBlocked {
        item_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Automatic playback skipped because no user interaction happened yet
    AutoplaySuppressed {
        item_id: String,
        timestamp: DateTime<Utc>,
    },

    VolumeChanged {
        volume: f64,
        is_muted: bool,
        timestamp: DateTime<Utc>,
    },

    PlaybackRateChanged {
        playback_rate: f64,
        timestamp: DateTime<Utc>,
    },

    /// Position moved by seek/skip
    Seeked {
        item_id: String,
        position: f64,
        timestamp: DateTime<Utc>,
    },

    /// Progress record accepted by the progress service
    ProgressSaved {
        item_id: String,
        current_time: f64,
        is_completed: bool,
        timestamp: DateTime<Utc>,
    },

    /// Highlighted read-along segment changed (or word/paragraph within it)
    ActiveSegmentChanged {
        item_id: String,
        /// Active sentence `segment_index`, None when nothing is active
        segment_index: Option<usize>,
        word_index: Option<usize>,
        paragraph_index: Option<usize>,
        current_time: f64,
        timestamp: DateTime<Utc>,
    },

    /// Views should scroll the given sentence into view
    ScrollRequested {
        item_id: String,
        segment_index: usize,
        behavior: ScrollBehavior,
        block: ScrollBlock,
        timestamp: DateTime<Utc>,
    },

    /// Read-along data for an item became available (or audio-only)
    ReadAlongLoaded {
        item_id: String,
        has_read_along: bool,
        segment_count: usize,
        timestamp: DateTime<Utc>,
    },

    DisplaySettingsChanged {
        auto_scroll: bool,
        text_size: TextSize,
        timestamp: DateTime<Utc>,
    },

    /// Upcoming items handed to the backend for prefetch
    PreloadScheduled {
        item_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl LecternEvent {
    /// Get event type as string for SSE event names and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            LecternEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            LecternEvent::ItemChanged { .. } => "ItemChanged",
            LecternEvent::TimeUpdate { .. } => "TimeUpdate",
            LecternEvent::PlaybackEnded { .. } => "PlaybackEnded",
            LecternEvent::PlaybackError { .. } => "PlaybackError",
            LecternEvent::AutoplayBlocked { .. } => "AutoplayBlocked",
            LecternEvent::AutoplaySuppressed { .. } => "AutoplaySuppressed",
            LecternEvent::VolumeChanged { .. } => "VolumeChanged",
            LecternEvent::PlaybackRateChanged { .. } => "PlaybackRateChanged",
            LecternEvent::Seeked { .. } => "Seeked",
            LecternEvent::ProgressSaved { .. } => "ProgressSaved",
            LecternEvent::ActiveSegmentChanged { .. } => "ActiveSegmentChanged",
            LecternEvent::ScrollRequested { .. } => "ScrollRequested",
            LecternEvent::ReadAlongLoaded { .. } => "ReadAlongLoaded",
            LecternEvent::DisplaySettingsChanged { .. } => "DisplaySettingsChanged",
            LecternEvent::PreloadScheduled { .. } => "PreloadScheduled",
        }
    }

    /// Item the event refers to, if any
    pub fn item_id(&self) -> Option<&str> {
        match self {
            LecternEvent::PlaybackStateChanged { item_id, .. }
            | LecternEvent::PlaybackError { item_id, .. }
            | LecternEvent::AutoplayBlocked { item_id, .. } => item_id.as_deref(),
            LecternEvent::ItemChanged { item_id, .. }
            | LecternEvent::TimeUpdate { item_id, .. }
            | LecternEvent::PlaybackEnded { item_id, .. }
            | LecternEvent::AutoplaySuppressed { item_id, .. }
            | LecternEvent::Seeked { item_id, .. }
            | LecternEvent::ProgressSaved { item_id, .. }
            | LecternEvent::ActiveSegmentChanged { item_id, .. }
            | LecternEvent::ScrollRequested { item_id, .. }
            | LecternEvent::ReadAlongLoaded { item_id, .. } => Some(item_id),
            LecternEvent::VolumeChanged { .. }
            | LecternEvent::PlaybackRateChanged { .. }
            | LecternEvent::DisplaySettingsChanged { .. }
            | LecternEvent::PreloadScheduled { .. } => None,
        }
    }
}

/// Central event distribution bus
///
/// Uses `tokio::sync::broadcast` internally:
/// - Publishing never blocks on slow subscribers
/// - Any number of concurrent subscribers
/// - Subscribers that fall behind see `RecvError::Lagged` and skip ahead
///
/// # Examples
///
/// ```
/// use lectern_common::events::{EventBus, LecternEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(LecternEvent::PlaybackRateChanged {
///     playback_rate: 1.5,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(LecternEvent::PlaybackRateChanged { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LecternEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering at most `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LecternEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LecternEvent,
    ) -> Result<usize, broadcast::error::SendError<LecternEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LecternEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
