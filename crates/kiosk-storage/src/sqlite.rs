//! SQLite-backed durable store.

use crate::{migrations, DurableStore, KeyUpdate, StorageError, StorageResult};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tracing::debug;

const UPSERT_SQL: &str = "INSERT INTO kv_entries (key, value, updated_at)
     VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
     ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at";
const SELECT_SQL: &str = "SELECT value FROM kv_entries WHERE key = ?1";
const DELETE_SQL: &str = "DELETE FROM kv_entries WHERE key = ?1";

/// Durable store backed by a single SQLite table.
///
/// Every `set` is one upsert statement, so a key is replaced atomically
/// even if the process dies mid-write.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store at the given path, running migrations if needed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        migrations::run_migrations(&conn)?;

        debug!(path = %path.display(), "Opened durable store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store for testing.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Surface "disk full" as a rejected write rather than a generic SQLite error.
fn map_write_error(err: rusqlite::Error) -> StorageError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DiskFull) | Some(ErrorCode::ReadOnly) => {
            StorageError::WriteRejected(err.to_string())
        }
        _ => StorageError::Sqlite(err),
    }
}

impl DurableStore for SqliteStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.conn
            .lock()
            .execute(UPSERT_SQL, params![key, value])
            .map_err(map_write_error)?;
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .lock()
            .query_row(SELECT_SQL, params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let removed = self
            .conn
            .lock()
            .execute(DELETE_SQL, params![key])
            .map_err(map_write_error)?;
        Ok(removed > 0)
    }

    /// Runs inside `BEGIN IMMEDIATE`, so the write lock is taken before the
    /// read and other connections wait on `busy_timeout`.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> KeyUpdate,
    ) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_write_error)?;

        let current: Option<String> = tx
            .query_row(SELECT_SQL, params![key], |row| row.get(0))
            .optional()?;
        let written = match apply(current) {
            KeyUpdate::Keep => return Ok(()),
            KeyUpdate::Set(value) => tx.execute(UPSERT_SQL, params![key, value]),
            KeyUpdate::Delete => tx.execute(DELETE_SQL, params![key]),
        };
        written.map_err(map_write_error)?;

        tx.commit().map_err(map_write_error)
    }

    fn list_keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key FROM kv_entries
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sqlite_store_set_get_delete() {
        let store = SqliteStore::open_in_memory().unwrap();

        assert_eq!(store.get("missing").unwrap(), None);

        store.set("key", "v1").unwrap();
        store.set("key", "v2").unwrap();
        assert_eq!(store.get("key").unwrap().as_deref(), Some("v2"));
        assert!(store.has("key").unwrap());

        assert!(store.delete("key").unwrap());
        assert!(!store.delete("key").unwrap());
        assert!(!store.has("key").unwrap());
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("kiosk.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("pending_queue_v1", r#"{"version":1,"items":[]}"#).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("pending_queue_v1").unwrap().as_deref(),
            Some(r#"{"version":1,"items":[]}"#)
        );
    }

    #[test]
    fn test_sqlite_update_is_atomic_across_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kiosk.sqlite");
        let first = SqliteStore::open(&path).unwrap();
        let second = SqliteStore::open(&path).unwrap();
        first.set("counter", "0").unwrap();

        let bump = |store: &SqliteStore| {
            for _ in 0..50 {
                store
                    .update("counter", &mut |current| {
                        let n: u32 = current.unwrap().parse().unwrap();
                        KeyUpdate::Set((n + 1).to_string())
                    })
                    .unwrap();
            }
        };
        std::thread::scope(|s| {
            s.spawn(|| bump(&first));
            s.spawn(|| bump(&second));
        });

        assert_eq!(first.get("counter").unwrap().as_deref(), Some("100"));
    }

    #[test]
    fn test_sqlite_update_keep_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("k", "v").unwrap();

        store.update("k", &mut |_| KeyUpdate::Keep).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.update("k", &mut |_| KeyUpdate::Delete).unwrap();
        assert!(!store.has("k").unwrap());

        store
            .update("k", &mut |current| {
                assert_eq!(current, None);
                KeyUpdate::Set("fresh".into())
            })
            .unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_sqlite_store_prefix_listing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("delivery.endpoint_url", "http://x").unwrap();
        store.set("delivery.endpoint_key", "k").unwrap();
        store.set("deliveryish", "no").unwrap();
        store.set("audit_log_v1", "[]").unwrap();

        let keys = store.list_keys_with_prefix("delivery.").unwrap();
        assert_eq!(keys, vec!["delivery.endpoint_key", "delivery.endpoint_url"]);
    }

    #[test]
    fn test_sqlite_store_rejects_newer_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kiosk.sqlite");
        SqliteStore::open(&path).unwrap();

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "INSERT INTO migrations (version, name) VALUES (99, 'future')",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            SqliteStore::open(&path),
            Err(StorageError::Migration(_))
        ));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kiosk.sqlite");
        SqliteStore::open(&path).unwrap();
        SqliteStore::open(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
