//! Course data model shared between the player and its external services
//!
//! All wire types use camelCase JSON keys, matching the content service.

use serde::{Deserialize, Serialize};

/// A single playable audio unit (chapter)
///
/// Items are immutable once fetched. Their order inside the parent
/// collection is significant: it drives "next item" and preloading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    /// Duration as reported by the content service (seconds)
    pub duration_seconds: f64,
    pub audio_url: String,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        duration_seconds: f64,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration_seconds,
            audio_url: audio_url.into(),
        }
    }
}

/// Persisted playback position for a (user, item) pair
///
/// Last write wins from the client's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub item_id: String,
    pub current_time: f64,
    pub is_completed: bool,
}

/// Granularity of a read-along segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Sentence,
    Word,
    Paragraph,
}

impl std::fmt::Display for SegmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentType::Sentence => write!(f, "sentence"),
            SegmentType::Word => write!(f, "word"),
            SegmentType::Paragraph => write!(f, "paragraph"),
        }
    }
}

/// Time-bounded span of text with known playback start/end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAlongSegment {
    pub segment_index: usize,
    pub segment_type: SegmentType,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_end: Option<usize>,
}

impl ReadAlongSegment {
    /// Build a sentence segment (the type used for navigation/highlighting)
    pub fn sentence(segment_index: usize, start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self::with_type(SegmentType::Sentence, segment_index, start_time, end_time, text)
    }

    pub fn with_type(
        segment_type: SegmentType,
        segment_index: usize,
        start_time: f64,
        end_time: f64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            segment_index,
            segment_type,
            start_time,
            end_time,
            text: text.into(),
            character_start: None,
            character_end: None,
        }
    }

    /// Inclusive-start / exclusive-end containment, optionally widened by `tolerance`
    pub fn contains(&self, time: f64, tolerance: f64) -> bool {
        time >= self.start_time - tolerance && time < self.end_time + tolerance
    }

    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

/// Read-along text and timing for one item
///
/// Absent data or `has_read_along == false` means "audio only"; it is
/// never an error for the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAlongData {
    pub item_id: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub has_read_along: bool,
    #[serde(default)]
    pub segments: Vec<ReadAlongSegment>,
}

impl ReadAlongData {
    /// Placeholder used when read-along data is missing or failed to load
    pub fn audio_only(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            text_content: String::new(),
            has_read_along: false,
            segments: Vec::new(),
        }
    }

    /// True when the overlay has something to highlight
    pub fn is_synced(&self) -> bool {
        self.has_read_along
            && self
                .segments
                .iter()
                .any(|s| s.segment_type == SegmentType::Sentence)
    }

    /// Segments of one type, in the order they were delivered
    pub fn segments_of(&self, segment_type: SegmentType) -> impl Iterator<Item = &ReadAlongSegment> {
        self.segments.iter().filter(move |s| s.segment_type == segment_type)
    }
}

/// Problem found while checking sentence coverage
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageIssue {
    /// Segment `segment_index` starts before the previous one ends
    Overlap { segment_index: usize, overlap: f64 },
    /// Uncovered time between two consecutive segments
    Gap { after_segment_index: usize, start: f64, end: f64 },
    /// Segment whose end precedes its start
    Inverted { segment_index: usize },
}

/// Check that sentence segments are sorted, non-overlapping and gap-free
///
/// `tolerance` absorbs rounding in the timing data. Issues are reported,
/// never fixed: the synchronizer copes with gaps on its own.
pub fn check_sentence_coverage(data: &ReadAlongData, tolerance: f64) -> Vec<CoverageIssue> {
    let mut sentences: Vec<&ReadAlongSegment> = data.segments_of(SegmentType::Sentence).collect();
    sentences.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut issues = Vec::new();
    let mut previous: Option<&ReadAlongSegment> = None;

    for segment in sentences {
        if segment.end_time < segment.start_time {
            issues.push(CoverageIssue::Inverted {
                segment_index: segment.segment_index,
            });
        }

        if let Some(prev) = previous {
            let delta = segment.start_time - prev.end_time;
            if delta < -tolerance {
                issues.push(CoverageIssue::Overlap {
                    segment_index: segment.segment_index,
                    overlap: -delta,
                });
            } else if delta > tolerance {
                issues.push(CoverageIssue::Gap {
                    after_segment_index: prev.segment_index,
                    start: prev.end_time,
                    end: segment.start_time,
                });
            }
        }
        previous = Some(segment);
    }

    issues
}
