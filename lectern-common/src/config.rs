//! Bootstrap configuration file resolution and loading
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `<user config dir>/<app>/config.toml`
//! 4. Compiled defaults (no file)
//!
//! A config file that cannot be found is NOT an error: the caller logs a
//! warning and starts with compiled defaults. A file that exists but does not
//! parse IS an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "LECTERN_CONFIG";

/// Application directory under the user's config dir
pub const APP_DIR_NAME: &str = "lectern";

/// Where the active config file came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserConfigDir(PathBuf),
    /// No file found, compiled defaults apply
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::UserConfigDir(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level / filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolves which config file to read
pub struct ConfigResolver {
    env_var: String,
    app_dir: String,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::with_names(CONFIG_ENV_VAR, APP_DIR_NAME)
    }

    /// Resolver reading a different env var / app dir (used by tests and tooling)
    pub fn with_names(env_var: &str, app_dir: &str) -> Self {
        Self {
            env_var: env_var.to_string(),
            app_dir: app_dir.to_string(),
        }
    }

    /// Pick the config file following the priority order
    ///
    /// The command-line and environment paths are taken as given (a missing
    /// file there is reported by [`load_toml`]). The user config dir is only
    /// used when the file actually exists.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> ConfigSource {
        if let Some(path) = cli_arg {
            return ConfigSource::CommandLine(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }

        if let Some(path) = self.user_config_path() {
            if path.exists() {
                return ConfigSource::UserConfigDir(path);
            }
        }

        ConfigSource::Defaults
    }

    /// `<config_dir>/<app>/config.toml`, if the platform has a config dir
    pub fn user_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(&self.app_dir).join("config.toml"))
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a TOML config of type `T` from the resolved source
///
/// Falls back to `T::default()` with a warning when there is no file or the
/// named file does not exist.
pub fn load_toml<T>(source: &ConfigSource) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = source.path() else {
        warn!("No config file found, using compiled defaults");
        return Ok(T::default());
    };

    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config = toml::from_str::<T>(&content)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Config file {} not found, using compiled defaults", path.display());
            Ok(T::default())
        }
        Err(e) => Err(Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))),
    }
}
