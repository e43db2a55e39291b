//! Timestamp and media-time utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Clamp a media position to `[0, duration]`
///
/// NaN positions collapse to 0. A non-positive or NaN duration only
/// enforces the lower bound, since the real length is not known yet.
pub fn clamp_position(position: f64, duration: f64) -> f64 {
    if position.is_nan() {
        return 0.0;
    }
    let lower = position.max(0.0);
    if duration.is_finite() && duration > 0.0 {
        lower.min(duration)
    } else {
        lower
    }
}

/// Format seconds as `m:ss` or `h:mm:ss` for log lines
pub fn format_seconds(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
