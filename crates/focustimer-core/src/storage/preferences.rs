//! File-backed preferences with change notification.
//!
//! Every successful write is saved to disk first and then published on a
//! `watch` channel, so a running [`crate::timer::TimerService`] picks up new
//! durations and notification toggles without polling.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::watch;

use super::config::Config;
use crate::error::ConfigError;

/// One applied `set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreferenceChange {
    pub key: String,
    pub value: String,
}

pub struct PreferenceStore {
    path: PathBuf,
    tx: watch::Sender<Config>,
}

impl PreferenceStore {
    /// Open `<data dir>/config.toml`.
    pub fn open() -> Result<Self, ConfigError> {
        Self::open_at(&super::data_dir()?.join("config.toml"))
    }

    pub fn open_at(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::with_config(path, Config::load_from(path)?))
    }

    /// Open `<data dir>/config.toml` even when stored values are out of range.
    pub fn open_unchecked() -> Result<Self, ConfigError> {
        Self::open_unchecked_at(&super::data_dir()?.join("config.toml"))
    }

    /// Open without range checks. Every `set` still validates the whole
    /// result, so only a change that repairs the file is accepted.
    pub fn open_unchecked_at(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::load_unchecked_from(path)?;
        if let Err(e) = config.validate() {
            tracing::warn!(path = %path.display(), error = %e, "configuration out of range");
        }
        Ok(Self::with_config(path, config))
    }

    fn with_config(path: &Path, config: Config) -> Self {
        let (tx, _rx) = watch::channel(config);
        Self {
            path: path.to_path_buf(),
            tx,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration.
    pub fn config(&self) -> Config {
        self.tx.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.tx.borrow().get(key)
    }

    /// Validate, persist and publish one value.
    pub fn set(&self, key: &str, value: &str) -> Result<PreferenceChange, ConfigError> {
        let mut next = self.config();
        next.set(key, value)?;
        self.publish(next)?;
        Ok(PreferenceChange {
            key: key.to_string(),
            value: self.get(key).unwrap_or_else(|| value.to_string()),
        })
    }

    /// Receiver that always holds the latest configuration.
    pub fn subscribe(&self) -> watch::Receiver<Config> {
        self.tx.subscribe()
    }

    /// Restore defaults. Onboarding stays completed once done.
    pub fn reset(&self) -> Result<Config, ConfigError> {
        let next = Config {
            onboarding_completed: self.tx.borrow().onboarding_completed,
            ..Config::default()
        };
        self.publish(next.clone())?;
        tracing::info!("preferences reset to defaults");
        Ok(next)
    }

    pub fn complete_onboarding(&self) -> Result<(), ConfigError> {
        let next = Config {
            onboarding_completed: true,
            ..self.config()
        };
        self.publish(next)
    }

    fn publish(&self, config: Config) -> Result<(), ConfigError> {
        config.save_to(&self.path)?;
        self.tx.send_replace(config);
        Ok(())
    }
}
