//! Configuration for the shard watcher.
//!
//! Layered configuration:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SHARDWATCH_` and use double
//! underscores to separate nested levels:
//! - `SHARDWATCH_WATCHER__MAX_CONCURRENT_LOADS=8` sets `watcher.max_concurrent_loads`
//! - `SHARDWATCH_WATCHER__EXTENSION=shard` sets `watcher.extension`
//! - `SHARDWATCH_LOGGING__DEFAULT=info` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::watcher::INDEX_FORMAT_VERSION;

/// Directory holding the settings file, searched upwards from the cwd.
const CONFIG_DIR: &str = ".shardwatch";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "SHARDWATCH_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Shard watcher configuration
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatcherConfig {
    /// File extension of shard files, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Highest shard format version to load; newer shards are ignored
    #[serde(default = "default_format_version")]
    pub format_version: u64,

    /// Maximum number of shards loaded concurrently during one scan
    #[serde(default = "default_max_concurrent_loads")]
    pub max_concurrent_loads: usize,

    /// Capacity of the file event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `shardwatch::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 { 1 }
fn default_extension() -> String { "zoekt".to_string() }
fn default_format_version() -> u64 { INDEX_FORMAT_VERSION }
fn default_max_concurrent_loads() -> usize { num_cpus::get() }
fn default_event_buffer() -> usize { 100 }
fn default_log_level() -> String { "warn".to_string() }

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watcher: WatcherConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            format_version: default_format_version(),
            max_concurrent_loads: default_max_concurrent_loads(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// Uses `.shardwatch/settings.toml` from the current directory or the
    /// nearest ancestor that has one. A missing file just means defaults.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path =
            Self::find_config().unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores
            // stay part of the field name.
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file, searching from the current directory up to root.
    fn find_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}
