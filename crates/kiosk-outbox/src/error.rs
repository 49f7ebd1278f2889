//! Outbox error types.

use kiosk_storage::StorageError;
use thiserror::Error;

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Durable store error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint rejected the record
    #[error("Send failed: {0}")]
    Send(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted collection written by a newer schema
    #[error("Unsupported schema version {found} for {key} (supported: {supported})")]
    UnsupportedVersion {
        key: String,
        found: u64,
        supported: u64,
    },

    /// File-share target could not be mapped or written
    #[error("File-share error: {0}")]
    FileShare(String),

    /// Line sealing/opening failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Scheduler was started twice
    #[error("Flush scheduler already started")]
    AlreadyStarted,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;
