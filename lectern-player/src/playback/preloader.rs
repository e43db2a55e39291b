//! Preloader
//!
//! Warms the next one or two items of the active collection so switching
//! to them starts quickly. Purely advisory: a failed prefetch is logged and
//! forgotten, and the current resource is never touched.

use crate::backend::AudioBackend;
use crate::observer::EventObserver;
use async_trait::async_trait;
use lectern_common::events::{EventBus, LecternEvent};
use lectern_common::Item;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Items following `active_id` by position, at most `count`
///
/// Empty when the active item is not part of `items`.
pub fn next_items(items: &[Item], active_id: &str, count: usize) -> Vec<Item> {
    items
        .iter()
        .position(|item| item.id == active_id)
        .map(|pos| items.iter().skip(pos + 1).take(count).cloned().collect())
        .unwrap_or_default()
}

#[derive(Debug, Default)]
struct PreloadState {
    items: Vec<Item>,
    active_id: Option<String>,
    /// Item ids whose audio was already requested
    warmed: HashSet<String>,
    targets: Vec<String>,
}

pub struct Preloader {
    backend: Arc<dyn AudioBackend>,
    events: EventBus,
    count: usize,
    state: Mutex<PreloadState>,
}

impl Preloader {
    /// `count` is clamped to 1..=2
    pub fn new(backend: Arc<dyn AudioBackend>, events: EventBus, count: usize) -> Self {
        Self {
            backend,
            events,
            count: count.clamp(1, 2),
            state: Mutex::new(PreloadState::default()),
        }
    }

    /// Replace the ordered item list; returns newly requested item ids
    pub async fn set_items(&self, items: Vec<Item>) -> Vec<String> {
        self.state.lock().await.items = items;
        self.refresh().await
    }

    /// Record the active item; returns newly requested item ids
    pub async fn set_active(&self, item_id: &str) -> Vec<String> {
        self.state.lock().await.active_id = Some(item_id.to_string());
        self.refresh().await
    }

    /// Current preload targets (item ids)
    pub async fn targets(&self) -> Vec<String> {
        self.state.lock().await.targets.clone()
    }

    async fn refresh(&self) -> Vec<String> {
        let to_request: Vec<Item> = {
            let mut state = self.state.lock().await;
            let upcoming = match state.active_id.as_deref() {
                Some(active) => next_items(&state.items, active, self.count),
                None => Vec::new(),
            };
            state.targets = upcoming.iter().map(|item| item.id.clone()).collect();
            upcoming
                .into_iter()
                .filter(|item| !state.warmed.contains(&item.id))
                .collect()
        };

        let mut requested = Vec::new();
        for item in to_request {
            match self.backend.prefetch(&item.audio_url).await {
                Ok(()) => {
                    debug!("Preloading {} ({})", item.id, item.audio_url);
                    requested.push(item.id);
                }
                Err(e) => debug!("Preload of {} skipped: {}", item.id, e),
            }
        }

        if !requested.is_empty() {
            self.state
                .lock()
                .await
                .warmed
                .extend(requested.iter().cloned());
            self.events.emit_lossy(LecternEvent::PreloadScheduled {
                item_ids: requested.clone(),
                timestamp: chrono::Utc::now(),
            });
        }
        requested
    }
}

#[async_trait]
impl EventObserver for Preloader {
    fn name(&self) -> &'static str {
        "preloader"
    }

    async fn on_event(&self, event: LecternEvent) {
        if let LecternEvent::ItemChanged { item_id, .. } = event {
            self.set_active(&item_id).await;
        }
    }
}
