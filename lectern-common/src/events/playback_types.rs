//! Playback-related type definitions
//!
//! Supporting types for the engine state machine and read-along display.

use serde::{Deserialize, Serialize};

/// Engine state machine value
///
/// `Idle → Loading → Ready ⇄ Playing ⇄ Paused → Ended`, with `Error`
/// reachable from `Loading` or `Playing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// No item loaded
    #[default]
    Idle,
    /// Source attached, waiting for the resource to report metadata
    Loading,
    /// Item loaded, position known, not playing
    Ready,
    Playing,
    Paused,
    /// Position reached the end of the item
    Ended,
    /// Resource failed to load or play
    Error,
}

impl PlaybackStatus {
    /// States in which seek/skip are accepted
    pub fn is_seekable(self) -> bool {
        matches!(self, PlaybackStatus::Ready | PlaybackStatus::Playing | PlaybackStatus::Paused)
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Loading => write!(f, "loading"),
            PlaybackStatus::Ready => write!(f, "ready"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Ended => write!(f, "ended"),
            PlaybackStatus::Error => write!(f, "error"),
        }
    }
}

/// The single observable playback state of a session
///
/// Owned and mutated by the engine; every view reads the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub item_id: Option<String>,
    pub status: PlaybackStatus,
    pub current_time: f64,
    pub duration: f64,
    /// 0.0 - 1.0
    pub volume: f64,
    /// 0.5 - 2.0
    pub playback_rate: f64,
    pub is_muted: bool,
    pub is_playing: bool,
    pub is_loading: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            item_id: None,
            status: PlaybackStatus::Idle,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            playback_rate: 1.0,
            is_muted: false,
            is_playing: false,
            is_loading: false,
            has_error: false,
            error_message: None,
        }
    }
}

impl PlaybackSnapshot {
    /// Fraction of the item played, 0.0 when the duration is unknown
    pub fn progress_fraction(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Read-along text size
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextSize {
    Small,
    #[default]
    Medium,
    Large,
    #[serde(rename = "xlarge")]
    XLarge,
}

impl TextSize {
    /// Font scale relative to `Medium`
    pub fn scale(self) -> f64 {
        match self {
            TextSize::Small => 0.875,
            TextSize::Medium => 1.0,
            TextSize::Large => 1.25,
            TextSize::XLarge => 1.5,
        }
    }
}

impl std::fmt::Display for TextSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextSize::Small => write!(f, "small"),
            TextSize::Medium => write!(f, "medium"),
            TextSize::Large => write!(f, "large"),
            TextSize::XLarge => write!(f, "xlarge"),
        }
    }
}

impl std::str::FromStr for TextSize {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(TextSize::Small),
            "medium" => Ok(TextSize::Medium),
            "large" => Ok(TextSize::Large),
            "xlarge" => Ok(TextSize::XLarge),
            other => Err(crate::Error::InvalidInput(format!("unknown text size: {}", other))),
        }
    }
}

/// Scroll animation requested from a view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Where the scrolled element should land inside the viewport
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBlock {
    Start,
    Center,
    Nearest,
}
