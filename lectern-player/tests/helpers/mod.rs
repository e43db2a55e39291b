//! Test helpers for lectern-player integration tests
//!
//! In-memory stand-ins for the content service, item fixtures and a
//! polling wait for state that settles on background tasks.

#![allow(dead_code)]

use async_trait::async_trait;
use lectern_common::{Item, ProgressRecord, ReadAlongData, ReadAlongSegment};
use lectern_player::backend::ClockBackend;
use lectern_player::config::{AutoplayPolicy, PlayerConfig};
use lectern_player::error::{Error, Result};
use lectern_player::playback::{AutoplayGate, EngineSettings, PlaybackEngine};
use lectern_player::services::{ItemSource, ProgressSink, ReadAlongSource, Services};
use lectern_player::PlayerContext;
use lectern_common::events::EventBus;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

pub fn item(id: &str, duration: f64) -> Item {
    Item::new(id, format!("Chapter {}", id), duration, format!("mem://{}.mp3", id))
}

/// `count` items `ch-0`, `ch-1`, ... of 60 s each
pub fn collection(count: usize) -> Vec<Item> {
    (0..count).map(|i| item(&format!("ch-{}", i), 60.0)).collect()
}

/// Three sentences: [0,5) [5,12) [12,20)
pub fn read_along(item_id: &str) -> ReadAlongData {
    ReadAlongData {
        item_id: item_id.to_string(),
        text_content: "It was dark. The wind howled outside. Nobody slept.".to_string(),
        has_read_along: true,
        segments: vec![
            ReadAlongSegment::sentence(0, 0.0, 5.0, "It was dark."),
            ReadAlongSegment::sentence(1, 5.0, 12.0, "The wind howled outside."),
            ReadAlongSegment::sentence(2, 12.0, 20.0, "Nobody slept."),
        ],
    }
}

// ============================================================================
// Service stand-ins
// ============================================================================

/// Progress sink that records every write
#[derive(Default)]
pub struct RecordingProgressSink {
    records: Mutex<Vec<ProgressRecord>>,
    saved: Mutex<HashMap<String, ProgressRecord>>,
    failing: AtomicBool,
    fetch_failing: AtomicBool,
}

impl RecordingProgressSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Saved position returned by `fetch_progress`
    pub fn with_saved(self: Arc<Self>, record: ProgressRecord) -> Arc<Self> {
        self.saved
            .lock()
            .unwrap()
            .insert(record.item_id.clone(), record);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_fetch_failing(&self, failing: bool) {
        self.fetch_failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<ProgressRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingProgressSink {
    async fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Service("progress store unavailable".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn fetch_progress(&self, item_id: &str) -> Result<Option<ProgressRecord>> {
        if self.fetch_failing.load(Ordering::SeqCst) {
            return Err(Error::Service("progress store unavailable".to_string()));
        }
        Ok(self.saved.lock().unwrap().get(item_id).cloned())
    }
}

/// Read-along source backed by a map; unknown items have no read-along
#[derive(Default)]
pub struct StaticReadAlongSource {
    data: Mutex<HashMap<String, ReadAlongData>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticReadAlongSource {
    pub fn new(entries: impl IntoIterator<Item = ReadAlongData>) -> Arc<Self> {
        let source = Self::default();
        {
            let mut data = source.data.lock().unwrap();
            for entry in entries {
                data.insert(entry.item_id.clone(), entry);
            }
        }
        Arc::new(source)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadAlongSource for StaticReadAlongSource {
    async fn fetch_read_along(&self, item_id: &str) -> Result<Option<ReadAlongData>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Service("read-along service unavailable".to_string()));
        }
        Ok(self.data.lock().unwrap().get(item_id).cloned())
    }
}

/// Item source with fixed collections
#[derive(Default)]
pub struct StaticItemSource {
    collections: HashMap<String, Vec<Item>>,
}

impl StaticItemSource {
    pub fn new(collections: impl IntoIterator<Item = (&'static str, Vec<Item>)>) -> Arc<Self> {
        Arc::new(Self {
            collections: collections
                .into_iter()
                .map(|(id, items)| (id.to_string(), items))
                .collect(),
        })
    }
}

#[async_trait]
impl ItemSource for StaticItemSource {
    async fn fetch_items(&self, collection_id: &str) -> Result<Vec<Item>> {
        self.collections
            .get(collection_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("collection {}", collection_id)))
    }
}

/// Service handles plus the concrete stand-ins for assertions
pub struct TestServices {
    pub progress: Arc<RecordingProgressSink>,
    pub read_along: Arc<StaticReadAlongSource>,
    pub items: Arc<StaticItemSource>,
}

impl TestServices {
    pub fn new() -> Self {
        Self {
            progress: RecordingProgressSink::new(),
            read_along: StaticReadAlongSource::new([read_along("ch-0"), read_along("ch-1")]),
            items: StaticItemSource::new([("book", collection(4))]),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            progress: self.progress.clone(),
            read_along: self.read_along.clone(),
            items: self.items.clone(),
        }
    }
}

// ============================================================================
// Engine / context construction
// ============================================================================

/// Bare engine on a clock backend; drive resource events with `pump_events`
pub fn engine(policy: AutoplayPolicy) -> (Arc<ClockBackend>, Arc<PlaybackEngine>) {
    let (backend, rx) = ClockBackend::new(policy);
    let engine = Arc::new(PlaybackEngine::new(
        backend.clone(),
        rx,
        Arc::new(AutoplayGate::new()),
        EventBus::new(256),
        EngineSettings::default(),
    ));
    (backend, engine)
}

/// Player context with the default config and the given services
pub fn player(services: &TestServices) -> (PlayerContext, Arc<ClockBackend>) {
    player_with_config(PlayerConfig::default(), services)
}

pub fn player_with_config(config: PlayerConfig, services: &TestServices) -> (PlayerContext, Arc<ClockBackend>) {
    let (backend, rx) = ClockBackend::new(config.playback.autoplay_policy);
    let player = PlayerContext::new(config, backend.clone(), rx, services.services());
    (player, backend)
}

/// Advance the clock in `step` increments up to `seconds` of media time
pub async fn play_for(backend: &ClockBackend, seconds: f64, step: f64) {
    let steps = (seconds / step).round() as usize;
    for _ in 0..steps {
        backend.advance(step).await;
    }
}

/// Poll `condition` until it holds; panics after two seconds
pub async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition().await {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
