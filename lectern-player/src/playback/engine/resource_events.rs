//! Backend event intake
//!
//! Resource events are applied in arrival order. Each carries the source
//! token it was produced for; events for a superseded source are dropped.

use super::core::PlaybackEngine;
use crate::backend::ResourceEvent;
use lectern_common::events::{LecternEvent, PlaybackStatus};
use lectern_common::time::clamp_position;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

impl PlaybackEngine {
    /// Apply one backend event to the engine state
    pub async fn handle_resource_event(&self, event: ResourceEvent) {
        let mut inner = self.inner.lock().await;
        if event.token() != inner.token {
            debug!("Dropping resource event for superseded source: {:?}", event);
            return;
        }
        let Some(item_id) = inner.item_id() else {
            return;
        };

        match event {
            ResourceEvent::Ready { duration, .. } => {
                if duration.is_finite() && duration > 0.0 {
                    inner.duration = duration;
                    inner.current_time = clamp_position(inner.current_time, duration);
                }
                if inner.status == PlaybackStatus::Loading {
                    self.set_status(&mut inner, PlaybackStatus::Ready);
                }
                self.publish(&inner);
            }

            ResourceEvent::TimeUpdate { current_time, .. } => {
                if matches!(inner.status, PlaybackStatus::Idle | PlaybackStatus::Error) {
                    return;
                }
                inner.current_time = clamp_position(current_time, inner.duration);
                self.publish(&inner);
                self.events.emit_lossy(LecternEvent::TimeUpdate {
                    item_id,
                    current_time: inner.current_time,
                    duration: inner.duration,
                    timestamp: chrono::Utc::now(),
                });
            }

            ResourceEvent::Buffering { buffering, .. } => {
                inner.buffering = buffering;
                self.publish(&inner);
            }

            ResourceEvent::Ended { .. } => {
                inner.current_time = inner.duration;
                inner.buffering = false;
                self.set_status(&mut inner, PlaybackStatus::Ended);
                self.publish(&inner);
                info!("Item {} played to the end", item_id);
                self.events.emit_lossy(LecternEvent::PlaybackEnded {
                    item_id,
                    duration: inner.duration,
                    timestamp: chrono::Utc::now(),
                });
            }

            ResourceEvent::Error { token, message } => {
                drop(inner);
                self.fail(token, message).await;
            }
        }
    }

    /// Apply every resource event queued so far; returns how many were applied
    ///
    /// Only useful before [`PlaybackEngine::spawn_event_loop`] took the
    /// receiver (tests drive the engine this way).
    pub async fn pump_events(&self) -> usize {
        let drained: Vec<ResourceEvent> = {
            let mut guard = self.resource_rx.lock().await;
            let Some(rx) = guard.as_mut() else {
                return 0;
            };
            std::iter::from_fn(|| rx.try_recv().ok()).collect()
        };

        let count = drained.len();
        for event in drained {
            self.handle_resource_event(event).await;
        }
        count
    }

    /// Spawn the task applying resource events as they arrive
    ///
    /// Returns `None` if the loop was already started.
    pub async fn spawn_event_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self.resource_rx.lock().await.take()?;
        let engine = Arc::clone(self);

        Some(tokio::spawn(async move {
            info!("Resource event loop started");
            while let Some(event) = rx.recv().await {
                engine.handle_resource_event(event).await;
            }
            warn!("Resource event channel closed, event loop exiting");
        }))
    }
}
