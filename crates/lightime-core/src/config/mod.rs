//! TOML-based timer configuration.
//!
//! The core consumes a validated [`TimerConfig`] value. A reload replaces
//! the whole value and only affects sessions started afterwards.
//!
//! Configuration is stored at `~/.config/lightime/config.toml`.

mod watcher;

pub use watcher::{reload_from_file, ConfigWatcher};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::session::{MAX_DURATION_MINUTES, MIN_DURATION_MINUTES};
use crate::storage::data_dir;

/// How the UI should draw attention when the warning fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WarningMode {
    #[default]
    Flash,
    Resize,
    ColorChange,
}

/// Timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Length of a session started without an explicit duration.
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: u32,
    /// Remaining time at which the one-time warning fires.
    #[serde(default = "default_warning_threshold_seconds")]
    pub warning_threshold_seconds: u32,
    /// Longest gap a session survives before it is invalidated.
    #[serde(default = "default_resume_threshold_seconds")]
    pub resume_threshold_seconds: u32,
    #[serde(default = "default_preset_durations")]
    pub preset_durations: Vec<u32>,
    /// Scheduler period. Read when the session service starts.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub warning_mode: WarningMode,
}

fn default_duration_minutes() -> u32 {
    25
}
fn default_warning_threshold_seconds() -> u32 {
    120
}
fn default_resume_threshold_seconds() -> u32 {
    300
}
fn default_preset_durations() -> Vec<u32> {
    vec![15, 25, 45, 60]
}
fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: default_duration_minutes(),
            warning_threshold_seconds: default_warning_threshold_seconds(),
            resume_threshold_seconds: default_resume_threshold_seconds(),
            preset_durations: default_preset_durations(),
            tick_interval_ms: default_tick_interval_ms(),
            warning_mode: WarningMode::default(),
        }
    }
}

impl TimerConfig {
    /// Check every field against its allowed range.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES;
        if !durations.contains(&self.default_duration_minutes) {
            return Err(ConfigError::invalid(
                "default_duration_minutes",
                format!(
                    "must be between 1 and 240 minutes, got {}",
                    self.default_duration_minutes
                ),
            ));
        }
        if !(60..=600).contains(&self.warning_threshold_seconds) {
            return Err(ConfigError::invalid(
                "warning_threshold_seconds",
                format!(
                    "must be between 60 and 600 seconds, got {}",
                    self.warning_threshold_seconds
                ),
            ));
        }
        if !(60..=3600).contains(&self.resume_threshold_seconds) {
            return Err(ConfigError::invalid(
                "resume_threshold_seconds",
                format!(
                    "must be between 60 and 3600 seconds, got {}",
                    self.resume_threshold_seconds
                ),
            ));
        }
        if !(1..=10).contains(&self.preset_durations.len()) {
            return Err(ConfigError::invalid(
                "preset_durations",
                format!("must have 1-10 items, got {}", self.preset_durations.len()),
            ));
        }
        if let Some(bad) = self
            .preset_durations
            .iter()
            .find(|minutes| !durations.contains(minutes))
        {
            return Err(ConfigError::invalid(
                "preset_durations",
                format!("every preset must be between 1 and 240 minutes, got {bad}"),
            ));
        }
        if !(100..=5000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::invalid(
                "tick_interval_ms",
                format!(
                    "must be between 100 and 5000 ms, got {}",
                    self.tick_interval_ms
                ),
            ));
        }
        Ok(())
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::from_secs(u64::from(self.warning_threshold_seconds))
    }

    pub fn resume_threshold(&self) -> Duration {
        Duration::from_secs(u64::from(self.resume_threshold_seconds))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Duration in minutes of the preset at `index`.
    pub fn preset(&self, index: usize) -> Option<u32> {
        self.preset_durations.get(index).copied()
    }

    /// Parse and validate a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    /// Returns `ParseFailed` for malformed TOML and `InvalidValue` for
    /// out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let cfg: TimerConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `~/.config/lightime[-dev]/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/lightime"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load and validate the file at `path`.
    ///
    /// # Errors
    /// Returns `LoadFailed` if the file cannot be read, otherwise the
    /// errors of [`TimerConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from disk, writing the defaults first if no file exists.
    ///
    /// # Errors
    /// Returns an error if an existing file is invalid or the default
    /// file cannot be written.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }
        let cfg = Self::default();
        cfg.save(path)?;
        Ok(cfg)
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }
}
