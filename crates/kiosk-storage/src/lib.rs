//! Durable key-value storage for the kiosk relay.
//!
//! The store holds opaque string values under string keys. Callers own the
//! meaning of each key; see [`StorageKeys`] for the well-known ones.
//!
//! - [`SqliteStore`]: crash-resilient on-disk store (WAL journal, one upsert per write)
//! - [`MemoryStore`]: process-local store for tests and ephemeral runs

mod keys;
mod memory;
mod migrations;
mod sqlite;
mod traits;

pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{DurableStore, KeyUpdate};

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// The backend refused the write (quota, read-only media, ...)
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Open the on-disk store at `path`, creating it if needed.
pub fn open_store(path: &Path) -> StorageResult<Arc<dyn DurableStore>> {
    let store = SqliteStore::open(path)?;
    Ok(Arc::new(store))
}
