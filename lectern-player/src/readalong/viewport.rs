//! Viewport geometry reported by views
//!
//! Used to decide whether the active sentence needs scrolling. Geometry the
//! views have not reported counts as "not visible".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Visible window of the read-along text (same units as element bounds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub top: f64,
    pub height: f64,
}

/// Vertical extent of one rendered sentence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentBounds {
    pub segment_index: usize,
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ViewportState {
    viewport: Option<Viewport>,
    bounds: HashMap<usize, SegmentBounds>,
}

impl ViewportState {
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    /// Merge newly reported element bounds
    pub fn update_layout(&mut self, bounds: impl IntoIterator<Item = SegmentBounds>) {
        for b in bounds {
            self.bounds.insert(b.segment_index, b);
        }
    }

    /// Forget element bounds (text reflowed)
    pub fn invalidate_layout(&mut self) {
        self.bounds.clear();
    }

    /// Forget everything (new item)
    pub fn reset(&mut self) {
        self.bounds.clear();
        self.viewport = None;
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Whether the sentence is entirely inside the viewport
    pub fn is_fully_visible(&self, segment_index: usize) -> bool {
        match (self.viewport, self.bounds.get(&segment_index)) {
            (Some(vp), Some(b)) => b.top >= vp.top && b.top + b.height <= vp.top + vp.height,
            _ => false,
        }
    }
}
