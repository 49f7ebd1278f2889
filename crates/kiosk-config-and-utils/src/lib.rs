//! Core configuration, paths and logging for the kiosk relay.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_LOG_LEVEL, DEFAULT_RETENTION_HOURS};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, level_directive};
pub use paths::Paths;
