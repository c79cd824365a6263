//! Core error types for lightime-core.
//!
//! Command misuse (`SessionError`) is recoverable and leaves the session
//! untouched. An invalidated session is not an error: it ends with a
//! distinct outcome status on the event bus.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionId;

/// Core error type for lightime-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session command errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Crash-recovery checkpoint errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Clock read failures
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Errors returned to the caller of a session command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Requested duration is outside 1-240 minutes.
    #[error("Invalid duration: {minutes} minutes (must be between 1 and 240)")]
    InvalidDuration { minutes: u32 },

    /// Another session is Running or Paused.
    #[error("Session {id} is already active")]
    SessionAlreadyActive { id: SessionId },

    #[error("No running session")]
    NotRunning,

    #[error("No paused session")]
    NotPaused,

    /// Preset index does not exist in the current configuration.
    #[error("Unknown preset {index} ({available} presets configured)")]
    UnknownPreset { index: usize, available: usize },

    /// The clock could not be read; the command was not applied.
    #[error("Clock unavailable: {0}")]
    ClockUnavailable(ClockError),

    /// The session service has shut down.
    #[error("Session service is not running")]
    ServiceUnavailable,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Failed to watch the configuration file
    #[error("Failed to watch {path}: {message}")]
    WatchFailed { path: PathBuf, message: String },
}

/// Checkpoint storage errors.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint storage failed: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The stored snapshot could not be decoded.
    #[error("Checkpoint is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Checkpoint IO failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Clock read failure. The scheduler skips the tick and tries again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Clock read failed: {0}")]
    ReadFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
