mod config;
pub mod database;
pub mod migrations;
mod preferences;

pub use config::{Config, NotificationsConfig, TimerConfig, UiConfig};
pub use database::Database;
pub use preferences::{PreferenceChange, PreferenceStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `FOCUSTIMER_HOME` wins when set. Otherwise `~/.config/focustimer`, or
/// `~/.config/focustimer-dev` with `FOCUSTIMER_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSTIMER_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSTIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focustimer-dev")
            } else {
                base_dir.join("focustimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
