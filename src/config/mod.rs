use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::console::log::Severity;

/// Host configuration, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub aliases: AliasConfig,
    #[serde(default)]
    pub log_file: LogFileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directory scanned for plugin dynamic libraries.
    #[serde(default = "default_plugin_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Entries retained in the message log before block eviction.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Oldest entries dropped per eviction.
    #[serde(default = "default_log_evict_block")]
    pub log_evict_block: usize,

    /// Maximum input-history entries kept for recall.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Worker-lane wake interval in milliseconds.
    #[serde(default = "default_lane_poll_ms")]
    pub lane_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasConfig {
    /// Flat text file holding `alias,command;` records.
    #[serde(default = "default_alias_file")]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    /// Mirror log entries to a dated text file.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// File stem; files are named `<stem>-YYYY-MM-DD.log`.
    #[serde(default = "default_log_stem")]
    pub stem: String,

    /// Severity threshold; entries ranked less important are not mirrored.
    #[serde(default = "default_log_level")]
    pub level: Severity,
}

// Default value functions
fn default_plugin_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_log_capacity() -> usize {
    700
}

fn default_log_evict_block() -> usize {
    200
}

fn default_history_limit() -> usize {
    100
}

fn default_lane_poll_ms() -> u64 {
    50
}

fn default_alias_file() -> PathBuf {
    PathBuf::from("config").join("aliases.txt")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_stem() -> String {
    "emberhost".to_string()
}

fn default_log_level() -> Severity {
    Severity::Normal
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: default_plugin_dir(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            log_evict_block: default_log_evict_block(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            lane_poll_ms: default_lane_poll_ms(),
        }
    }
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            file: default_alias_file(),
        }
    }
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_log_dir(),
            stem: default_log_stem(),
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a specific JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load the default configuration: the user config file when present,
    /// built-in defaults otherwise.
    pub fn load_default() -> Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("emberhost").join("config.json");
            if path.exists() {
                return Self::load_from_file(path);
            }
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.console.log_capacity, 700);
        assert_eq!(config.console.log_evict_block, 200);
        assert_eq!(config.schedule.lane_poll_ms, 50);
        assert!(!config.log_file.enabled);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "plugins": { "dir": "/opt/ember/plugins" }, "console": { "log_capacity": 100 } }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.plugins.dir, PathBuf::from("/opt/ember/plugins"));
        assert_eq!(config.console.log_capacity, 100);
        // Unspecified fields keep their defaults.
        assert_eq!(config.console.log_evict_block, 200);
        assert_eq!(config.schedule.lane_poll_ms, 50);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from_file(&path).is_err());
    }
}
