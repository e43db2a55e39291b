//! Segment synchronizer
//!
//! Maps the advancing playback time to the active sentence (and the word
//! and paragraph inside it) and publishes highlight changes to the views.
//!
//! A change of active sentence is published immediately, together with a
//! scroll request when auto-scroll is on and the sentence is not fully
//! visible. Word/paragraph-only changes are rate limited.

use super::index::SegmentIndex;
use super::viewport::{SegmentBounds, Viewport, ViewportState};
use crate::config::ReadAlongConfig;
use lectern_common::events::{EventBus, LecternEvent, ScrollBehavior, ScrollBlock, TextSize};
use lectern_common::models::{check_sentence_coverage, SegmentType};
use lectern_common::{ReadAlongData, ReadAlongSegment};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Synchronizer tunables taken from `[readalong]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub tolerance_secs: f64,
    pub min_update_interval: Duration,
    pub auto_scroll: bool,
    pub text_size: TextSize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&ReadAlongConfig::default())
    }
}

impl From<&ReadAlongConfig> for SyncSettings {
    fn from(config: &ReadAlongConfig) -> Self {
        Self {
            tolerance_secs: config.tolerance_secs,
            min_update_interval: config.min_update_interval(),
            auto_scroll: config.auto_scroll,
            text_size: config.text_size,
        }
    }
}

/// Scroll the views should perform
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollRequest {
    pub segment_index: usize,
    pub behavior: ScrollBehavior,
    pub block: ScrollBlock,
}

impl ScrollRequest {
    fn centered(segment_index: usize) -> Self {
        Self {
            segment_index,
            behavior: ScrollBehavior::Smooth,
            block: ScrollBlock::Center,
        }
    }
}

/// One published highlight change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncUpdate {
    pub item_id: String,
    pub segment_index: Option<usize>,
    pub word_index: Option<usize>,
    pub paragraph_index: Option<usize>,
    pub current_time: f64,
    pub scroll: Option<ScrollRequest>,
}

/// Read-only view of the synchronizer for the HTTP surface
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAlongView {
    pub item_id: Option<String>,
    pub has_read_along: bool,
    pub text_content: String,
    pub sentences: Vec<ReadAlongSegment>,
    pub active_segment_index: Option<usize>,
    pub active_word_index: Option<usize>,
    pub active_paragraph_index: Option<usize>,
    pub auto_scroll: bool,
    pub text_size: TextSize,
    pub text_scale: f64,
}

#[derive(Debug, Default)]
struct SyncState {
    item_id: Option<String>,
    data: Option<ReadAlongData>,
    sentences: SegmentIndex,
    words: SegmentIndex,
    paragraphs: SegmentIndex,
    active_sentence: Option<usize>,
    active_word: Option<usize>,
    active_paragraph: Option<usize>,
    last_published: Option<Instant>,
    auto_scroll: bool,
    text_size: TextSize,
    viewport: ViewportState,
}

impl SyncState {
    fn clear_active(&mut self) {
        self.active_sentence = None;
        self.active_word = None;
        self.active_paragraph = None;
        self.last_published = None;
    }
}

pub struct SegmentSynchronizer {
    settings: SyncSettings,
    events: EventBus,
    state: RwLock<SyncState>,
}

impl SegmentSynchronizer {
    pub fn new(settings: SyncSettings, events: EventBus) -> Self {
        let state = SyncState {
            auto_scroll: settings.auto_scroll,
            text_size: settings.text_size,
            ..Default::default()
        };
        Self {
            settings,
            events,
            state: RwLock::new(state),
        }
    }

    /// Switch to `item_id` with no read-along data (yet)
    ///
    /// Clears the highlight of the previous item.
    pub async fn begin_item(&self, item_id: &str) {
        let had_highlight = {
            let mut state = self.state.write().await;
            let had_highlight = state.active_sentence.is_some();
            state.item_id = Some(item_id.to_string());
            state.data = None;
            state.sentences = SegmentIndex::default();
            state.words = SegmentIndex::default();
            state.paragraphs = SegmentIndex::default();
            state.clear_active();
            state.viewport.reset();
            had_highlight
        };

        if had_highlight {
            self.events.emit_lossy(LecternEvent::ActiveSegmentChanged {
                item_id: item_id.to_string(),
                segment_index: None,
                word_index: None,
                paragraph_index: None,
                current_time: 0.0,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Item the synchronizer currently follows
    pub async fn current_item(&self) -> Option<String> {
        self.state.read().await.item_id.clone()
    }

    /// Install read-along data; sorts segments once
    ///
    /// Data for an item other than the followed one is ignored (returns
    /// `false`): it arrived after the user moved on.
    pub async fn load(&self, data: ReadAlongData) -> bool {
        let mut state = self.state.write().await;
        if state.item_id.as_deref() != Some(data.item_id.as_str()) {
            debug!("Discarding read-along data for inactive item {}", data.item_id);
            return false;
        }

        let tolerance = self.settings.tolerance_secs;
        for issue in check_sentence_coverage(&data, tolerance) {
            warn!("Read-along timing issue in {}: {:?}", data.item_id, issue);
        }

        let synced = data.is_synced();
        if synced {
            state.sentences = SegmentIndex::of_type(&data, SegmentType::Sentence, tolerance);
            state.words = SegmentIndex::of_type(&data, SegmentType::Word, tolerance);
            state.paragraphs = SegmentIndex::of_type(&data, SegmentType::Paragraph, tolerance);
        } else {
            state.sentences = SegmentIndex::default();
            state.words = SegmentIndex::default();
            state.paragraphs = SegmentIndex::default();
        }
        state.clear_active();

        info!(
            "Read-along for {}: {} ({} sentences, {} words)",
            data.item_id,
            if synced { "synced" } else { "audio only" },
            state.sentences.len(),
            state.words.len()
        );
        self.events.emit_lossy(LecternEvent::ReadAlongLoaded {
            item_id: data.item_id.clone(),
            has_read_along: synced,
            segment_count: state.sentences.len(),
            timestamp: chrono::Utc::now(),
        });
        state.data = Some(data);
        true
    }

    /// `segment_index` of the sentence active at `time`
    pub async fn active_segment_index(&self, time: f64) -> Option<usize> {
        self.state.read().await.sentences.active_segment_index(time)
    }

    /// Whether `segment_index` is the highlighted sentence
    pub async fn is_segment_active(&self, segment_index: usize) -> bool {
        self.state.read().await.active_sentence == Some(segment_index)
    }

    pub async fn active_segment(&self) -> Option<usize> {
        self.state.read().await.active_sentence
    }

    /// Start time of the sentence, for the caller to pass to `seek`
    pub async fn seek_to_segment(&self, segment_index: usize) -> Option<f64> {
        self.state.read().await.sentences.start_time_of(segment_index)
    }

    /// Observe playback time; returns the update if one was published
    pub async fn on_time_update(&self, item_id: &str, time: f64, now: Instant) -> Option<SyncUpdate> {
        let mut state = self.state.write().await;
        if state.item_id.as_deref() != Some(item_id) || state.sentences.is_empty() {
            return None;
        }

        let sentence_pos = state.sentences.active_position(time);
        let sentence = sentence_pos.and_then(|pos| state.sentences.get(pos));
        let segment_index = sentence.map(|s| s.segment_index);
        let word_index = sentence.and_then(|s| active_word(&state.words, s, time));
        let paragraph_index = state.paragraphs.active_segment_index(time);

        let sentence_changed = segment_index != state.active_sentence;
        let detail_changed =
            word_index != state.active_word || paragraph_index != state.active_paragraph;
        if !sentence_changed && !detail_changed {
            return None;
        }
        if !sentence_changed {
            let throttled = state
                .last_published
                .is_some_and(|last| now.saturating_duration_since(last) < self.settings.min_update_interval);
            if throttled {
                return None;
            }
        }

        state.active_sentence = segment_index;
        state.active_word = word_index;
        state.active_paragraph = paragraph_index;
        state.last_published = Some(now);

        let scroll = match segment_index {
            Some(index) if sentence_changed && state.auto_scroll && !state.viewport.is_fully_visible(index) => {
                Some(ScrollRequest::centered(index))
            }
            _ => None,
        };
        drop(state);

        let update = SyncUpdate {
            item_id: item_id.to_string(),
            segment_index,
            word_index,
            paragraph_index,
            current_time: time,
            scroll,
        };
        self.publish(&update);
        Some(update)
    }

    /// Enable/disable auto-scroll
    ///
    /// Enabling it brings the active sentence into view right away if needed.
    pub async fn set_auto_scroll(&self, enabled: bool) -> Option<ScrollRequest> {
        let (scroll, text_size, item_id) = {
            let mut state = self.state.write().await;
            let was_enabled = state.auto_scroll;
            state.auto_scroll = enabled;
            let scroll = match state.active_sentence {
                Some(index) if enabled && !was_enabled && !state.viewport.is_fully_visible(index) => {
                    Some(ScrollRequest::centered(index))
                }
                _ => None,
            };
            (scroll, state.text_size, state.item_id.clone())
        };

        self.emit_display_settings(enabled, text_size);
        if let (Some(request), Some(item_id)) = (scroll, item_id) {
            self.emit_scroll(&item_id, request);
        }
        scroll
    }

    /// Change the text size; reported element bounds become stale
    pub async fn set_text_size(&self, size: TextSize) {
        let auto_scroll = {
            let mut state = self.state.write().await;
            state.text_size = size;
            state.viewport.invalidate_layout();
            state.auto_scroll
        };
        self.emit_display_settings(auto_scroll, size);
    }

    pub async fn update_viewport(&self, viewport: Viewport) {
        self.state.write().await.viewport.set_viewport(viewport);
    }

    pub async fn update_layout(&self, bounds: Vec<SegmentBounds>) {
        self.state.write().await.viewport.update_layout(bounds);
    }

    pub async fn view(&self) -> ReadAlongView {
        let state = self.state.read().await;
        let (has_read_along, text_content) = match &state.data {
            Some(data) => (data.is_synced(), data.text_content.clone()),
            None => (false, String::new()),
        };
        ReadAlongView {
            item_id: state.item_id.clone(),
            has_read_along,
            text_content,
            sentences: state.sentences.segments().to_vec(),
            active_segment_index: state.active_sentence,
            active_word_index: state.active_word,
            active_paragraph_index: state.active_paragraph,
            auto_scroll: state.auto_scroll,
            text_size: state.text_size,
            text_scale: state.text_size.scale(),
        }
    }

    fn publish(&self, update: &SyncUpdate) {
        self.events.emit_lossy(LecternEvent::ActiveSegmentChanged {
            item_id: update.item_id.clone(),
            segment_index: update.segment_index,
            word_index: update.word_index,
            paragraph_index: update.paragraph_index,
            current_time: update.current_time,
            timestamp: chrono::Utc::now(),
        });
        if let Some(request) = update.scroll {
            self.emit_scroll(&update.item_id, request);
        }
    }

    fn emit_scroll(&self, item_id: &str, request: ScrollRequest) {
        self.events.emit_lossy(LecternEvent::ScrollRequested {
            item_id: item_id.to_string(),
            segment_index: request.segment_index,
            behavior: request.behavior,
            block: request.block,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_display_settings(&self, auto_scroll: bool, text_size: TextSize) {
        self.events.emit_lossy(LecternEvent::DisplaySettingsChanged {
            auto_scroll,
            text_size,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Word inside `sentence` whose interval contains `time`
fn active_word(words: &SegmentIndex, sentence: &ReadAlongSegment, time: f64) -> Option<usize> {
    let word = words.get(words.containing_position(time)?)?;
    let tolerance = 1e-6;
    let inside = word.start_time >= sentence.start_time - tolerance
        && word.end_time <= sentence.end_time + tolerance;
    inside.then_some(word.segment_index)
}
