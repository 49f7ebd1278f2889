//! Logging initialization for the relay.
//!
//! Every process writes structured JSONL to `<base>/logs/kiosk.jsonl` and,
//! for foreground runs, a compact human-readable stream to stderr.

use crate::config::DEFAULT_LOG_LEVEL;
use crate::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Append-only log file writer, flushed after every line.
#[derive(Clone)]
struct JsonlWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl JsonlWriter {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for JsonlWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for JsonlWriter {
    type Writer = JsonlWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over `level`. When `log_file` is given, JSON
/// lines are appended to it in addition to the stderr output.
///
/// # Example
///
/// ```ignore
/// init_logging("info", Some(&paths.log_file()))?;
/// tracing::info!("relay started");
/// ```
pub fn init_logging(level: &str, log_file: Option<&Path>) -> CoreResult<()> {
    let json_layer = match log_file {
        Some(path) => {
            let writer = JsonlWriter::new(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(writer)
                    .with_filter(env_filter(level)),
            )
        }
        None => None,
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_writer(io::stderr)
        .with_filter(env_filter(level));

    tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| CoreError::Config(format!("logging already initialized: {}", e)))?;

    if let Some(path) = log_file {
        tracing::debug!(log_path = %path.display(), "logging initialized");
    }
    Ok(())
}

/// Map a configured level onto an `EnvFilter` directive.
///
/// Matching ignores case and surrounding whitespace. Unknown values fall
/// back to `info` rather than failing startup.
pub fn level_directive(level: &str) -> &'static str {
    let level = level.trim();
    ["off", "error", "warn", "info", "debug", "trace"]
        .into_iter()
        .find(|known| known.eq_ignore_ascii_case(level))
        .unwrap_or(if level.eq_ignore_ascii_case("warning") {
            "warn"
        } else {
            DEFAULT_LOG_LEVEL
        })
}
