//! TOML-based application configuration.
//!
//! Holds the settings the timer core reads but never writes:
//! - Session durations and auto-start
//! - Bell sound, player and timing
//! - Display preferences for front ends
//!
//! Configuration is stored at `~/.config/focusbell/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::bell::BellConfig;
use crate::error::{ConfigError, ValidationError};
use crate::timer::{
    MachineOptions, TimerSettings, DEFAULT_BREAK_DURATION_SECS, DEFAULT_WORK_DURATION_SECS,
    TICK_PERIOD,
};

/// Timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_duration")]
    pub work_duration_secs: u64,
    #[serde(default = "default_break_duration")]
    pub break_duration_secs: u64,
    #[serde(default)]
    pub auto_start: bool,
    /// Ring the bell and show a notification when a session completes.
    #[serde(default = "default_true")]
    pub notifications: bool,
}

/// Bell configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BellSection {
    /// Path to the alert sound. Empty uses the platform bell sound.
    #[serde(default)]
    pub sound: String,
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// External player command. Empty picks the first known player found.
    #[serde(default)]
    pub player: String,
    #[serde(default = "default_auto_start_delay")]
    pub auto_start_delay_ms: u64,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,
    #[serde(default = "default_watch_interval")]
    pub watch_interval_ms: u64,
    #[serde(default = "default_true")]
    pub wake_lock: bool,
}

/// Display configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_seconds: bool,
    #[serde(default)]
    pub compact: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusbell/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub bell: BellSection,
    #[serde(default)]
    pub display: DisplayConfig,
}

// Default functions
fn default_work_duration() -> u64 {
    DEFAULT_WORK_DURATION_SECS
}
fn default_break_duration() -> u64 {
    DEFAULT_BREAK_DURATION_SECS
}
fn default_true() -> bool {
    true
}
fn default_volume() -> u8 {
    100
}
fn default_auto_start_delay() -> u64 {
    1_000
}
fn default_ready_timeout() -> u64 {
    10_000
}
fn default_restart_delay() -> u64 {
    1_000
}
fn default_watch_interval() -> u64 {
    250
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_duration_secs: default_work_duration(),
            break_duration_secs: default_break_duration(),
            auto_start: false,
            notifications: true,
        }
    }
}

impl Default for BellSection {
    fn default() -> Self {
        Self {
            sound: String::new(),
            volume: default_volume(),
            player: String::new(),
            auto_start_delay_ms: default_auto_start_delay(),
            ready_timeout_ms: default_ready_timeout(),
            restart_delay_ms: default_restart_delay(),
            watch_interval_ms: default_watch_interval(),
            wake_lock: true,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_seconds: true,
            compact: false,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `<data_dir>/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// [`load`](Self::load) from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config at {}, writing defaults", path.display());
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("{}, using default configuration", e);
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, typed by the value it replaces. The change
    /// is only applied if the result still validates; nothing is saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// # Errors
    ///
    /// Returns an error for zero durations or intervals and volumes above 100.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.timer_settings().validate()?;
        if self.bell.volume > 100 {
            return Err(ValidationError::InvalidValue {
                field: "bell.volume".into(),
                message: "must be between 0 and 100".into(),
            });
        }
        for (field, value) in [
            ("bell.ready_timeout_ms", self.bell.ready_timeout_ms),
            ("bell.watch_interval_ms", self.bell.watch_interval_ms),
        ] {
            if value == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            work_duration_secs: self.timer.work_duration_secs,
            break_duration_secs: self.timer.break_duration_secs,
            auto_start: self.timer.auto_start,
            notifications_enabled: self.timer.notifications,
        }
    }

    pub fn bell_config(&self) -> BellConfig {
        BellConfig {
            ready_timeout: Duration::from_millis(self.bell.ready_timeout_ms),
            restart_delay: Duration::from_millis(self.bell.restart_delay_ms),
            watch_interval: Duration::from_millis(self.bell.watch_interval_ms),
            wake_lock: self.bell.wake_lock,
            ..BellConfig::default()
        }
    }

    pub fn machine_options(&self) -> MachineOptions {
        MachineOptions {
            auto_start_delay: Duration::from_millis(self.bell.auto_start_delay_ms),
            tick_period: TICK_PERIOD,
        }
    }

    /// The configured alert sound, if one is set.
    pub fn sound_path(&self) -> Option<PathBuf> {
        let sound = self.bell.sound.trim();
        (!sound.is_empty()).then(|| PathBuf::from(sound))
    }
}
