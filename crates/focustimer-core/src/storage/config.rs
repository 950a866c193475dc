//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Focus and break durations, cycle length, auto-advance
//! - Notification toggles and motivation cadence
//! - Appearance and onboarding state
//!
//! Configuration is stored at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};
use crate::notifications::NotificationConfig;
use crate::timer::{Durations, TimerSettings};

/// Timer configuration. Durations are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u64,
    #[serde(default = "default_short_break")]
    pub short_break: u64,
    #[serde(default = "default_long_break")]
    pub long_break: u64,
    /// Focus intervals before a long break.
    #[serde(default = "default_intervals_count")]
    pub intervals_count: u32,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub on_session_start: bool,
    #[serde(default = "default_true")]
    pub during_session: bool,
    #[serde(default = "default_true")]
    pub on_session_end: bool,
    #[serde(default)]
    pub on_break_start: bool,
    #[serde(default = "default_motivation_interval")]
    pub motivation_interval_secs: u64,
    #[serde(default = "default_true")]
    pub sound: bool,
    #[serde(default = "default_true")]
    pub vibration: bool,
}

/// UI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub dark_mode: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub onboarding_completed: bool,
}

// Default functions
fn default_focus_duration() -> u64 {
    25
}
fn default_short_break() -> u64 {
    5
}
fn default_long_break() -> u64 {
    15
}
fn default_intervals_count() -> u32 {
    4
}
fn default_motivation_interval() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            short_break: default_short_break(),
            long_break: default_long_break(),
            intervals_count: default_intervals_count(),
            auto_advance: true,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_session_start: true,
            during_session: true,
            on_session_end: true,
            on_break_start: false,
            motivation_interval_secs: default_motivation_interval(),
            sound: true,
            vibration: true,
        }
    }
}

/// Allowed ranges for numeric keys.
const RANGES: [(&str, u64, u64); 5] = [
    ("timer.focus_duration", 1, 60),
    ("timer.short_break", 1, 15),
    ("timer.long_break", 5, 30),
    ("timer.intervals_count", 1, 10),
    ("notifications.motivation_interval_secs", 10, 3600),
];

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
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => value
                    .trim()
                    .parse::<bool>()
                    .map(serde_json::Value::Bool)
                    .map_err(|_| invalid(format!("expected true or false, got '{value}'")))?,
                serde_json::Value::Number(_) => value
                    .trim()
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("expected a whole number, got '{value}'")))?,
                serde_json::Value::Object(_) => return Err(unknown()),
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory or write and return the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from a specific file, creating it with defaults when missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let cfg = Self::load_unchecked_from(path)?;
        cfg.validate().map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(cfg)
    }

    /// Like [`Config::load_from`] but without range checks, so a hand-edited
    /// file with out-of-range values can still be repaired with `set` or reset.
    pub fn load_unchecked_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
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

    /// Persist to the data directory.
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
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
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

    /// Set a config value by key, in memory only. The new value is typed by
    /// the existing one and range-checked; on error `self` is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or is out of range.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate().map_err(|e| invalid(e.to_string()))?;
        *self = updated;
        tracing::info!(key, value, "config updated");
        Ok(())
    }

    /// Check every numeric key against its allowed range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (key, min, max) in RANGES {
            let value = match key {
                "timer.focus_duration" => self.timer.focus_duration,
                "timer.short_break" => self.timer.short_break,
                "timer.long_break" => self.timer.long_break,
                "timer.intervals_count" => u64::from(self.timer.intervals_count),
                _ => self.notifications.motivation_interval_secs,
            };
            if !(min..=max).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field: key.to_string(),
                    min,
                    max,
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn durations(&self) -> Durations {
        Durations::from_minutes(
            self.timer.focus_duration,
            self.timer.short_break,
            self.timer.long_break,
        )
    }

    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            durations: self.durations(),
            cycle_length: self.timer.intervals_count,
            auto_advance: self.timer.auto_advance,
            motivation_interval_secs: self.notifications.motivation_interval_secs,
            ..TimerSettings::default()
        }
    }

    pub fn notification_config(&self) -> NotificationConfig {
        let n = &self.notifications;
        NotificationConfig {
            enabled: n.enabled,
            on_session_start: n.on_session_start,
            during_session: n.during_session,
            on_session_end: n.on_session_end,
            on_break_start: n.on_break_start,
            sound: n.sound,
            vibration: n.vibration,
        }
    }
}
