//! Player context
//!
//! The composition root's product: one engine, one snapshot holder, one
//! event bus and the observers hanging off it. Built once in `main` (or a
//! test) and handed to whoever needs it; cloning is cheap.

use crate::backend::{AudioBackend, ResourceEvent};
use crate::config::{PlayerConfig, ResumePolicy};
use crate::error::{Error, Result};
use crate::observer::spawn_observer;
use crate::playback::{AutoplayGate, EngineSettings, LoadOptions, PlaybackEngine, Preloader, ProgressTracker};
use crate::readalong::{ReadAlongObserver, SegmentSynchronizer, SyncSettings};
use crate::services::{ReadAlongCache, Services};
use lectern_common::events::{EventBus, LecternEvent, PlaybackSnapshot};
use lectern_common::Item;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Event bus capacity; SSE clients that fall further behind skip events
const EVENT_BUS_CAPACITY: usize = 256;

/// Options for [`PlayerContext::select_item`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SelectOptions {
    /// Start playing once loaded (suppressed until the user interacted)
    pub autoplay: bool,
    /// Explicit start offset; bypasses the saved position
    pub resume_at: Option<f64>,
}

/// A view's binding to the shared state
///
/// Holds receivers only: the snapshot is always read from the engine's
/// holder, never copied into the view.
pub struct ViewHandle {
    state: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Receiver<LecternEvent>,
}

impl ViewHandle {
    /// Latest snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.borrow().clone()
    }

    /// Wait for the next snapshot change; `false` once the engine is gone
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    pub fn events(&mut self) -> &mut broadcast::Receiver<LecternEvent> {
        &mut self.events
    }

    pub fn into_parts(self) -> (watch::Receiver<PlaybackSnapshot>, broadcast::Receiver<LecternEvent>) {
        (self.state, self.events)
    }
}

#[derive(Clone)]
pub struct PlayerContext {
    config: Arc<PlayerConfig>,
    engine: Arc<PlaybackEngine>,
    synchronizer: Arc<SegmentSynchronizer>,
    preloader: Arc<Preloader>,
    progress: Arc<ProgressTracker>,
    read_along: Arc<ReadAlongCache>,
    services: Services,
    collection: Arc<RwLock<Vec<Item>>>,
    /// Items whose saved position was already applied this session
    resumed: Arc<RwLock<HashSet<String>>>,
    events: EventBus,
    session_id: Uuid,
}

impl PlayerContext {
    pub fn new(
        config: PlayerConfig,
        backend: Arc<dyn AudioBackend>,
        resource_rx: mpsc::UnboundedReceiver<ResourceEvent>,
        services: Services,
    ) -> Self {
        let events = EventBus::new(EVENT_BUS_CAPACITY);

        let engine = Arc::new(PlaybackEngine::new(
            Arc::clone(&backend),
            resource_rx,
            Arc::new(AutoplayGate::new()),
            events.clone(),
            EngineSettings::from(&config.playback),
        ));
        let synchronizer = Arc::new(SegmentSynchronizer::new(
            SyncSettings::from(&config.readalong),
            events.clone(),
        ));
        let preloader = Arc::new(Preloader::new(
            backend,
            events.clone(),
            config.playback.effective_preload_count(),
        ));
        let progress = Arc::new(ProgressTracker::new(
            Arc::clone(&services.progress),
            events.clone(),
            config.playback.progress_interval_secs,
        ));
        let read_along = Arc::new(ReadAlongCache::new(Arc::clone(&services.read_along)));

        Self {
            config: Arc::new(config),
            engine,
            synchronizer,
            preloader,
            progress,
            read_along,
            services,
            collection: Arc::new(RwLock::new(Vec::new())),
            resumed: Arc::new(RwLock::new(HashSet::new())),
            events,
            session_id: Uuid::new_v4(),
        }
    }

    /// Spawn the resource event loop and the observers
    ///
    /// Call once, inside the runtime, before the first item is selected.
    pub async fn start(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(handle) = self.engine.spawn_event_loop().await {
            tasks.push(handle);
        }

        let progress_rx = self.events.subscribe();
        let readalong_rx = self.events.subscribe();
        let preload_rx = self.events.subscribe();
        tasks.push(spawn_observer(Arc::clone(&self.progress), progress_rx));
        tasks.push(spawn_observer(
            Arc::new(ReadAlongObserver::new(
                Arc::clone(&self.synchronizer),
                Arc::clone(&self.read_along),
            )),
            readalong_rx,
        ));
        tasks.push(spawn_observer(Arc::clone(&self.preloader), preload_rx));

        info!("Player context {} started", self.session_id);
        tasks
    }

    /// Install the ordered item list of the active collection
    pub async fn set_collection(&self, items: Vec<Item>) -> usize {
        let count = items.len();
        *self.collection.write().await = items.clone();
        self.preloader.set_items(items).await;
        info!("Collection installed with {} items", count);
        count
    }

    /// Fetch a collection from the content service and install it
    pub async fn load_collection(&self, collection_id: &str) -> Result<usize> {
        let items = self.services.items.fetch_items(collection_id).await?;
        Ok(self.set_collection(items).await)
    }

    pub async fn collection(&self) -> Vec<Item> {
        self.collection.read().await.clone()
    }

    /// Load an item of the active collection into the engine
    ///
    /// Returns `Ok(false)` when the item was already loaded. Selection is
    /// not a user gesture: `autoplay` stays suppressed until the user has
    /// used a playback control once.
    pub async fn select_item(&self, item_id: &str, options: SelectOptions) -> Result<bool> {
        let item = self
            .collection
            .read()
            .await
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Item {} is not in the active collection", item_id)))?;

        let resume_at = match options.resume_at {
            Some(position) => Some(position),
            None => self.saved_position(item_id).await,
        };

        Ok(self
            .engine
            .load(
                item,
                LoadOptions {
                    resume_at,
                    autoplay: options.autoplay,
                },
            )
            .await)
    }

    /// Resume offset for `item_id` per the configured resume policy
    async fn saved_position(&self, item_id: &str) -> Option<f64> {
        let apply = match self.config.playback.resume_policy {
            ResumePolicy::Never => false,
            ResumePolicy::EverySelection => true,
            ResumePolicy::FirstLoad => self.resumed.write().await.insert(item_id.to_string()),
        };
        if !apply {
            return None;
        }

        match self.services.progress.fetch_progress(item_id).await {
            Ok(Some(record)) if record.is_completed => {
                debug!("Item {} was completed before, starting from the beginning", item_id);
                self.progress.mark_completed(item_id).await;
                None
            }
            Ok(Some(record)) => {
                debug!("Resuming {} at {:.2}s", item_id, record.current_time);
                Some(record.current_time)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Could not fetch saved progress for {}: {}", item_id, e);
                None
            }
        }
    }

    /// Bind a view to the shared state
    pub fn bind_view(&self) -> ViewHandle {
        ViewHandle {
            state: self.engine.subscribe_state(),
            events: self.events.subscribe(),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    pub fn synchronizer(&self) -> &Arc<SegmentSynchronizer> {
        &self.synchronizer
    }

    pub fn preloader(&self) -> &Arc<Preloader> {
        &self.preloader
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn read_along(&self) -> &Arc<ReadAlongCache> {
        &self.read_along
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}
