//! Application configuration
//!
//! Defaults are centralized here; a `config.toml` may override any of them.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the platform's local data dir
pub const APP_DIR_NAME: &str = "ReminderApp";

/// Reminder collection file name
pub const DATA_FILE_NAME: &str = "reminders.json";

/// Log file written by the binary
pub const LOG_FILE_NAME: &str = "reminder.log";

/// Seconds between scheduler ticks
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub data_file: String,
    pub tick_interval_secs: u64,
    /// Default tracing filter; `RUST_LOG` takes precedence
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            data_file: DATA_FILE_NAME.to_string(),
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads a TOML config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.tick_interval_secs == 0 {
            return Err(AppError::config("tick_interval_secs must be greater than zero"));
        }
        if self.data_file.trim().is_empty() {
            return Err(AppError::config("data_file must not be empty"));
        }
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(APP_DIR_NAME))
}

/// Default location of `config.toml`, next to the data.
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}
