//! Core configuration
//!
//! Read-only tuning knobs for the refresh timers, the UI queue and logging.
//! Loaded from `<config dir>/vpn-catalog-core/core.json` when present; every
//! field falls back to its default so partial files are fine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const CONFIG_FILE: &str = "core.json";
const APP_DIR: &str = "vpn-catalog-core";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Full server list refresh period
    #[serde(default = "default_server_refresh")]
    pub server_refresh_interval_secs: u64,
    /// Server load refresh period
    #[serde(default = "default_load_refresh")]
    pub load_refresh_interval_secs: u64,
    /// Capacity of the worker → UI callback queue
    #[serde(default = "default_ui_queue_capacity")]
    pub ui_queue_capacity: usize,
    /// env_logger filter used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_server_refresh() -> u64 {
    3 * 60 * 60
}

fn default_load_refresh() -> u64 {
    15 * 60
}

fn default_ui_queue_capacity() -> usize {
    256
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            server_refresh_interval_secs: default_server_refresh(),
            load_refresh_interval_secs: default_load_refresh(),
            ui_queue_capacity: default_ui_queue_capacity(),
            log_filter: default_log_filter(),
        }
    }
}

impl CoreConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            log::info!("No config directory available, using default core config");
            return Self::default();
        };

        if !path.exists() {
            log::info!("No core config at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match Self::from_json_str(&content) {
                Ok(config) => {
                    log::info!("Loaded core config from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse core config {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read core config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, CoreError> {
        let config: CoreConfig =
            serde_json::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.server_refresh_interval_secs == 0 || self.load_refresh_interval_secs == 0 {
            return Err(CoreError::Config(
                "refresh intervals must be greater than zero".to_string(),
            ));
        }
        if self.ui_queue_capacity == 0 {
            return Err(CoreError::Config(
                "ui_queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.server_refresh_interval_secs)
    }

    pub fn load_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.load_refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.load_refresh_interval(), Duration::from_secs(900));
        assert_eq!(config.server_refresh_interval(), Duration::from_secs(10800));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{"load_refresh_interval_secs": 60, "log_filter": "debug"}"#)
                .unwrap();
        assert_eq!(config.load_refresh_interval_secs, 60);
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.ui_queue_capacity, 256);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = CoreConfig::from_json_str(r#"{"server_refresh_interval_secs": 0}"#).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn garbage_is_a_config_error() {
        assert!(matches!(
            CoreConfig::from_json_str("{not-json}"),
            Err(CoreError::Config(_))
        ));
    }
}
