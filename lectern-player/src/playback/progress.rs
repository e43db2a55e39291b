//! Progress tracker
//!
//! Turns the stream of time updates into a bounded number of progress
//! writes: one whenever playback moved at least the configured interval
//! (absolute difference, so backward seeks count too) away from the last
//! written position, plus one forced completion write when the item ends.
//!
//! Write failures are logged and not retried; the next due write carries
//! fresher data anyway.

use crate::observer::EventObserver;
use crate::services::ProgressSink;
use async_trait::async_trait;
use lectern_common::events::{EventBus, LecternEvent};
use lectern_common::ProgressRecord;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct TrackerState {
    item_id: Option<String>,
    last_written: f64,
    /// Items that completed this session (completion stays sticky)
    completed: HashSet<String>,
}

pub struct ProgressTracker {
    sink: Arc<dyn ProgressSink>,
    events: EventBus,
    interval_secs: f64,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn ProgressSink>, events: EventBus, interval_secs: f64) -> Self {
        Self {
            sink,
            events,
            interval_secs,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Start tracking a newly loaded item at `start_at`
    pub async fn begin_item(&self, item_id: &str, start_at: f64) {
        let mut state = self.state.lock().await;
        state.item_id = Some(item_id.to_string());
        state.last_written = start_at;
        debug!("Progress tracking {} from {:.2}s", item_id, start_at);
    }

    /// Remember that `item_id` was completed before (e.g. per saved progress)
    pub async fn mark_completed(&self, item_id: &str) {
        self.state.lock().await.completed.insert(item_id.to_string());
    }

    pub async fn is_completed(&self, item_id: &str) -> bool {
        self.state.lock().await.completed.contains(item_id)
    }

    /// Observe a time update; writes when the interval elapsed
    ///
    /// Returns the record that was written (successfully or not), `None`
    /// when no write was due or the update belongs to another item.
    pub async fn on_time_update(&self, item_id: &str, current_time: f64) -> Option<ProgressRecord> {
        let record = {
            let mut state = self.state.lock().await;
            if state.item_id.as_deref() != Some(item_id) {
                debug!("Dropping time update for inactive item {}", item_id);
                return None;
            }
            if (current_time - state.last_written).abs() < self.interval_secs {
                return None;
            }
            state.last_written = current_time;
            ProgressRecord {
                item_id: item_id.to_string(),
                current_time,
                is_completed: state.completed.contains(item_id),
            }
        };

        self.persist(&record).await;
        Some(record)
    }

    /// Forced completion write when the item reached its end
    pub async fn on_ended(&self, item_id: &str, duration: f64) -> Option<ProgressRecord> {
        {
            let mut state = self.state.lock().await;
            if state.item_id.as_deref() != Some(item_id) {
                debug!("Dropping end of inactive item {}", item_id);
                return None;
            }
            state.last_written = duration;
            state.completed.insert(item_id.to_string());
        }

        let record = ProgressRecord {
            item_id: item_id.to_string(),
            current_time: duration,
            is_completed: true,
        };
        self.persist(&record).await;
        Some(record)
    }

    async fn persist(&self, record: &ProgressRecord) {
        match self.sink.save_progress(record).await {
            Ok(()) => {
                debug!(
                    "Progress saved: {} at {:.2}s (completed: {})",
                    record.item_id, record.current_time, record.is_completed
                );
                self.events.emit_lossy(LecternEvent::ProgressSaved {
                    item_id: record.item_id.clone(),
                    current_time: record.current_time,
                    is_completed: record.is_completed,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                warn!("Failed to save progress for {}: {}", record.item_id, e);
            }
        }
    }
}

#[async_trait]
impl EventObserver for ProgressTracker {
    fn name(&self) -> &'static str {
        "progress"
    }

    async fn on_event(&self, event: LecternEvent) {
        match event {
            LecternEvent::ItemChanged { item_id, start_at, .. } => {
                self.begin_item(&item_id, start_at).await;
            }
            LecternEvent::TimeUpdate { item_id, current_time, .. } => {
                self.on_time_update(&item_id, current_time).await;
            }
            LecternEvent::PlaybackEnded { item_id, duration, .. } => {
                self.on_ended(&item_id, duration).await;
            }
            _ => {}
        }
    }
}
