//! Read-along overlay
//!
//! Highlights the sentence being narrated and keeps it in view.

pub mod index;
pub mod synchronizer;
pub mod viewport;

pub use index::SegmentIndex;
pub use synchronizer::{ReadAlongView, ScrollRequest, SegmentSynchronizer, SyncSettings, SyncUpdate};
pub use viewport::{SegmentBounds, Viewport};

use crate::observer::EventObserver;
use crate::services::ReadAlongCache;
use async_trait::async_trait;
use lectern_common::events::LecternEvent;
use std::sync::Arc;
use std::time::Instant;

/// Feeds engine events into the synchronizer
///
/// On item change the read-along data is fetched (audio-only on failure)
/// and installed only if the synchronizer still follows that item.
pub struct ReadAlongObserver {
    synchronizer: Arc<SegmentSynchronizer>,
    cache: Arc<ReadAlongCache>,
}

impl ReadAlongObserver {
    pub fn new(synchronizer: Arc<SegmentSynchronizer>, cache: Arc<ReadAlongCache>) -> Self {
        Self { synchronizer, cache }
    }
}

#[async_trait]
impl EventObserver for ReadAlongObserver {
    fn name(&self) -> &'static str {
        "readalong"
    }

    async fn on_event(&self, event: LecternEvent) {
        match event {
            LecternEvent::ItemChanged { item_id, .. } => {
                self.synchronizer.begin_item(&item_id).await;
                let data = self.cache.load_or_audio_only(&item_id).await;
                self.synchronizer.load(data).await;
            }
            LecternEvent::TimeUpdate { item_id, current_time, .. } => {
                self.synchronizer
                    .on_time_update(&item_id, current_time, Instant::now())
                    .await;
            }
            LecternEvent::Seeked { item_id, position, .. } => {
                self.synchronizer
                    .on_time_update(&item_id, position, Instant::now())
                    .await;
            }
            _ => {}
        }
    }
}
