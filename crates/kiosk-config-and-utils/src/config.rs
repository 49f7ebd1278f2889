//! Configuration management for the relay.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default period of the recurring flush timer.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Default retention window for queued check-ins.
pub const DEFAULT_RETENTION_HOURS: u64 = 72;

/// Ten years; longer windows are a configuration mistake.
const MAX_RETENTION_HOURS: u64 = 24 * 365 * 10;
/// Upper bound for every seconds-valued setting.
const MAX_PERIOD_SECS: u64 = 24 * 60 * 60;

const DEFAULT_ENDPOINT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECTIVITY_PROBE_SECS: u64 = 10;

/// Main relay configuration.
///
/// Delivery destinations (endpoint URL, share credentials) are not part of
/// this file: they live in the durable store and are re-read on every
/// delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Period of the recurring flush timer, in seconds.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Maximum age of a queued record before it is evicted, in hours.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    /// Timeout for a single endpoint POST, in seconds.
    #[serde(default = "default_endpoint_timeout_secs")]
    pub endpoint_timeout_secs: u64,
    /// How often the connectivity probe runs, in seconds.
    #[serde(default = "default_connectivity_probe_secs")]
    pub connectivity_probe_secs: u64,
    /// Local mount point of the file share. Without it the file-share
    /// capability is unavailable.
    #[serde(default)]
    pub share_mount_root: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_flush_interval_secs() -> u64 {
    DEFAULT_FLUSH_INTERVAL_SECS
}

fn default_retention_hours() -> u64 {
    DEFAULT_RETENTION_HOURS
}

fn default_endpoint_timeout_secs() -> u64 {
    DEFAULT_ENDPOINT_TIMEOUT_SECS
}

fn default_connectivity_probe_secs() -> u64 {
    DEFAULT_CONNECTIVITY_PROBE_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            retention_hours: DEFAULT_RETENTION_HOURS,
            endpoint_timeout_secs: DEFAULT_ENDPOINT_TIMEOUT_SECS,
            connectivity_probe_secs: DEFAULT_CONNECTIVITY_PROBE_SECS,
            share_mount_root: None,
        }
    }
}

impl Config {
    /// Load configuration from the base directory, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the base directory.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Only the log level can be overridden from the environment.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("KIOSK_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Reject values that would stall the scheduler, evict everything or
    /// overflow when turned into durations.
    pub fn validate(&self) -> CoreResult<()> {
        let periods = [
            ("flush_interval_secs", self.flush_interval_secs),
            ("endpoint_timeout_secs", self.endpoint_timeout_secs),
            ("connectivity_probe_secs", self.connectivity_probe_secs),
        ];
        for (name, secs) in periods {
            if secs == 0 || secs > MAX_PERIOD_SECS {
                return Err(CoreError::Config(format!(
                    "{} must be between 1 and {}",
                    name, MAX_PERIOD_SECS
                )));
            }
        }
        if self.retention_hours == 0 || self.retention_hours > MAX_RETENTION_HOURS {
            return Err(CoreError::Config(format!(
                "retention_hours must be between 1 and {}",
                MAX_RETENTION_HOURS
            )));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(60 * 60))
    }

    pub fn endpoint_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint_timeout_secs)
    }

    pub fn connectivity_probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_probe_secs)
    }
}
