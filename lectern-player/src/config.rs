//! Configuration for lectern-player
//!
//! Bootstrap TOML loaded once at startup; the player must restart to pick up
//! changes. Every field has a compiled default so an absent file (or an
//! absent section) still yields a working player.
//!
//! ```toml
//! port = 5740
//!
//! [api]
//! base_url = "http://localhost:8080/api"
//! token = "..."
//! timeout_secs = 10
//!
//! [playback]
//! progress_interval_secs = 10
//! skip_forward_secs = 30
//! skip_backward_secs = 15
//! preload_count = 2
//! autoplay_policy = "require_gesture"
//! resume_policy = "first_load"
//! tick_interval_ms = 250
//!
//! [readalong]
//! tolerance_secs = 0.05
//! max_updates_per_sec = 20
//! auto_scroll = true
//! text_size = "medium"
//!
//! [logging]
//! level = "info"
//! ```

use lectern_common::config::{load_toml, ConfigResolver, LoggingConfig};
use lectern_common::TextSize;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default HTTP control-surface port
pub const DEFAULT_PORT: u16 = 5740;

/// Complete player configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub port: u16,
    pub api: ApiConfig,
    pub playback: PlaybackConfig,
    pub readalong: ReadAlongConfig,
    pub logging: LoggingConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api: ApiConfig::default(),
            playback: PlaybackConfig::default(),
            readalong: ReadAlongConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Resolve and load the config file, then validate it
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let source = ConfigResolver::new().resolve(cli_path);
        let config: PlayerConfig = load_toml(&source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the player cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.playback.progress_interval_secs <= 0.0 {
            return Err(Error::Config(
                "playback.progress_interval_secs must be positive".to_string(),
            ));
        }
        if self.playback.skip_forward_secs <= 0.0 || self.playback.skip_backward_secs <= 0.0 {
            return Err(Error::Config("skip durations must be positive".to_string()));
        }
        if self.playback.tick_interval_ms == 0 {
            return Err(Error::Config("playback.tick_interval_ms must be non-zero".to_string()));
        }
        if self.readalong.max_updates_per_sec == 0 {
            return Err(Error::Config(
                "readalong.max_updates_per_sec must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.readalong.tolerance_secs) {
            return Err(Error::Config(
                "readalong.tolerance_secs must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// External content/progress service
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token sent with every request, if set
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// How the platform treats playback that no user gesture caused
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutoplayPolicy {
    /// Every start is accepted
    Allow,
    /// Automatic starts are refused until a user gesture has started playback once
    #[default]
    RequireGesture,
}

/// When a saved position is applied on item selection
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Only the first time an item is selected in this session
    #[default]
    FirstLoad,
    /// Every time an item is selected
    EverySelection,
    /// Always start at 0
    Never,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Minimum playback-time distance between progress writes
    pub progress_interval_secs: f64,
    pub skip_forward_secs: f64,
    pub skip_backward_secs: f64,
    /// Upcoming items to prefetch (clamped to 1..=2)
    pub preload_count: usize,
    pub autoplay_policy: AutoplayPolicy,
    pub resume_policy: ResumePolicy,
    /// Media clock tick period of the clock backend
    pub tick_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval_secs: 10.0,
            skip_forward_secs: 30.0,
            skip_backward_secs: 15.0,
            preload_count: 2,
            autoplay_policy: AutoplayPolicy::default(),
            resume_policy: ResumePolicy::default(),
            tick_interval_ms: 250,
        }
    }
}

impl PlaybackConfig {
    pub fn effective_preload_count(&self) -> usize {
        self.preload_count.clamp(1, 2)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReadAlongConfig {
    /// Boundary widening applied when no segment strictly contains the time
    pub tolerance_secs: f64,
    /// Publication cap for word-level highlight changes
    pub max_updates_per_sec: u32,
    pub auto_scroll: bool,
    pub text_size: TextSize,
}

impl Default for ReadAlongConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: 0.05,
            max_updates_per_sec: 20,
            auto_scroll: true,
            text_size: TextSize::Medium,
        }
    }
}

impl ReadAlongConfig {
    pub fn min_update_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_updates_per_sec.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.playback.progress_interval_secs, 10.0);
        assert_eq!(config.playback.skip_forward_secs, 30.0);
        assert_eq!(config.playback.skip_backward_secs, 15.0);
        assert_eq!(config.playback.resume_policy, ResumePolicy::FirstLoad);
        assert_eq!(config.playback.autoplay_policy, AutoplayPolicy::RequireGesture);
        assert_eq!(config.readalong.tolerance_secs, 0.05);
        assert_eq!(config.readalong.min_update_interval(), Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: PlayerConfig = toml::from_str(
            r#"
            port = 6000

            [playback]
            resume_policy = "every_selection"
            preload_count = 5

            [readalong]
            text_size = "xlarge"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.playback.resume_policy, ResumePolicy::EverySelection);
        assert_eq!(config.playback.effective_preload_count(), 2);
        assert_eq!(config.playback.skip_forward_secs, 30.0);
        assert_eq!(config.readalong.text_size, TextSize::XLarge);
        assert_eq!(config.api.timeout_secs, 10);
    }

    #[test]
    fn test_preload_count_lower_clamp() {
        let playback = PlaybackConfig {
            preload_count: 0,
            ..Default::default()
        };
        assert_eq!(playback.effective_preload_count(), 1);
    }

    #[test]
    fn test_validation_rejects_nonsense() {
        let mut config = PlayerConfig::default();
        config.playback.progress_interval_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.readalong.max_updates_per_sec = 0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.playback.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_autoplay_policy_wire_names() {
        let config: PlaybackConfig = toml::from_str(r#"autoplay_policy = "allow""#).unwrap();
        assert_eq!(config.autoplay_policy, AutoplayPolicy::Allow);
    }
}
