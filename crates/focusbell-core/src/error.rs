//! Core error types for focusbell-core.
//!
//! Only [`EngineError`] ever reaches the caller of a timer command. Everything
//! raised inside the bell subsystem is logged and absorbed, so the remaining
//! types describe what went wrong without failing the command that triggered
//! it.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for focusbell-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Countdown engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The timer service task is gone.
    #[error("Timer service stopped")]
    ServiceStopped,
}

/// Countdown engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine task exited and no longer accepts commands.
    #[error("countdown engine is not running")]
    Disconnected,

    /// No tokio runtime to host the engine task.
    #[error("failed to spawn countdown engine: {0}")]
    SpawnFailed(String),
}

/// A bell playback strategy failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// No audio output device could be opened.
    #[error("no audio output available: {0}")]
    NoOutput(String),

    /// The alert resource could not be loaded or decoded.
    #[error("failed to load alert sound {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// The resource did not report ready within the buffering timeout.
    #[error("alert sound not ready after {timeout:?}")]
    NotReady { timeout: Duration },

    /// Playback was refused by the output.
    #[error("playback refused: {0}")]
    Refused(String),

    /// No audio-processing context exists to resume.
    #[error("no audio output context to resume")]
    NoOutputContext,
}

/// Notification permission was not granted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification permission {0}")]
pub struct PermissionError(pub crate::bell::Permission);

/// Showing a notification failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notifications are not supported here")]
    Unsupported,

    #[error("failed to show notification: {0}")]
    ShowFailed(String),
}

/// Acquiring a wake lock failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to acquire wake lock: {0}")]
pub struct WakeLockError(pub String);

/// Releasing a bell resource failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("failed to stop alert audio: {0}")]
    Audio(String),

    #[error("failed to release wake lock: {0}")]
    WakeLock(String),

    #[error("failed to close notification: {0}")]
    Notification(String),
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

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// No home/config directory could be determined or created
    #[error("Config directory unavailable: {0}")]
    NoDataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Unparseable duration string
    #[error("Invalid duration: '{0}'")]
    InvalidDuration(String),
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => {
                ConfigError::InvalidValue { key: field, message }
            }
            ValidationError::InvalidDuration(value) => ConfigError::InvalidValue {
                key: "duration".into(),
                message: format!("cannot parse '{value}'"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_keep_their_field_as_config_key() {
        let err: ConfigError = ValidationError::InvalidValue {
            field: "bell.volume".into(),
            message: "must be between 0 and 100".into(),
        }
        .into();
        assert!(matches!(&err, ConfigError::InvalidValue { key, .. } if key == "bell.volume"));

        let err: ConfigError = ValidationError::InvalidDuration("soon".into()).into();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn engine_errors_surface_through_core_error() {
        let err = CoreError::from(EngineError::Disconnected);
        assert!(matches!(err, CoreError::Engine(EngineError::Disconnected)));
        assert_eq!(err.to_string(), "Engine error: countdown engine is not running");
    }
}
