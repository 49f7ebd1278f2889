//! Pending queue of check-ins awaiting delivery.

use crate::collection::{self, OnCorrupt};
use crate::record::{retain_fresh, CheckInRecord};
use crate::OutboxResult;
use chrono::Utc;
use kiosk_storage::{DurableStore, KeyUpdate, StorageKeys};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum age of a queued record before it is evicted unread.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(72 * 60 * 60);

/// Durable, expiring FIFO of check-ins.
///
/// Every read and write drops records older than the retention window.
/// Writes are whole-collection rewrites done through
/// [`DurableStore::update`], so enqueues and writebacks from any process
/// sharing the store never interleave between read and write.
pub struct PendingQueue {
    store: Arc<dyn DurableStore>,
    retention: Duration,
}

impl PendingQueue {
    /// Create a queue with the default 72 hour retention.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_retention(store, DEFAULT_RETENTION)
    }

    pub fn with_retention(store: Arc<dyn DurableStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Append a record after evicting expired ones.
    ///
    /// Returns `false` if the queue could not be persisted.
    pub fn enqueue(&self, record: CheckInRecord) -> bool {
        match self.try_enqueue(record) {
            Ok(len) => {
                debug!(pending = len, "Enqueued check-in");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist pending queue");
                false
            }
        }
    }

    fn try_enqueue(&self, record: CheckInRecord) -> OutboxResult<usize> {
        self.rewrite(|current| {
            let mut items = retain_fresh(current, Utc::now(), self.retention);
            items.push(record.clone());
            let len = items.len();
            (items, len)
        })
    }

    fn rewrite(
        &self,
        apply: impl FnMut(Vec<CheckInRecord>) -> (Vec<CheckInRecord>, usize),
    ) -> OutboxResult<usize> {
        collection::rewrite(
            self.store.as_ref(),
            StorageKeys::PENDING_QUEUE,
            OnCorrupt::Replace,
            apply,
        )
    }

    /// Current non-expired records in FIFO order. Never mutates the store.
    ///
    /// Unreadable data reads as an empty queue.
    pub fn peek(&self) -> Vec<CheckInRecord> {
        match collection::load(self.store.as_ref(), StorageKeys::PENDING_QUEUE) {
            Ok(items) => retain_fresh(items, Utc::now(), self.retention),
            Err(e) => {
                warn!(error = %e, "Pending queue unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    /// Number of non-expired records.
    pub fn pending_count(&self) -> usize {
        self.peek().len()
    }

    /// Empty the queue. Clearing an empty queue is not an error.
    pub fn clear(&self) -> OutboxResult<()> {
        self.store.update(StorageKeys::PENDING_QUEUE, &mut |_| KeyUpdate::Delete)?;
        debug!("Cleared pending queue");
        Ok(())
    }

    /// Remove the first `consumed` records of `snapshot` from the queue.
    ///
    /// The current queue is re-read inside the store transaction and each
    /// consumed record's first structural match is removed, so records
    /// enqueued while the snapshot was being delivered are kept, including
    /// those enqueued by another process. Returns the number of records
    /// left.
    pub fn writeback(&self, consumed: usize, snapshot: &[CheckInRecord]) -> OutboxResult<usize> {
        let remaining = self.rewrite(|mut current| {
            for delivered in snapshot.iter().take(consumed) {
                if let Some(pos) = current.iter().position(|r| r == delivered) {
                    current.remove(pos);
                }
            }
            let remaining = retain_fresh(current, Utc::now(), self.retention);
            let len = remaining.len();
            (remaining, len)
        })?;
        debug!(consumed, remaining, "Wrote back pending queue");
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::timestamp;
    use crate::OutboxError;
    use kiosk_storage::{MemoryStore, SqliteStore};
    use tempfile::tempdir;

    fn hours_ago(hours: i64) -> String {
        timestamp(Utc::now() - chrono::Duration::hours(hours))
    }

    fn queue() -> (Arc<MemoryStore>, PendingQueue) {
        let store = Arc::new(MemoryStore::new());
        let queue = PendingQueue::new(store.clone());
        (store, queue)
    }

    fn names(records: &[CheckInRecord]) -> Vec<&str> {
        records.iter().map(|r| r.nombre.as_str()).collect()
    }

    #[test]
    fn test_expired_record_is_never_returned() {
        let (_, queue) = queue();

        assert!(queue.enqueue(CheckInRecord::new("old").with_created_at(hours_ago(73))));
        assert!(queue.peek().is_empty());

        let fresh = CheckInRecord::new("fresh").with_created_at(hours_ago(1));
        assert!(queue.enqueue(fresh.clone()));
        assert_eq!(queue.peek(), vec![fresh]);
    }

    #[test]
    fn test_enqueue_evicts_expired_from_store() {
        let (store, queue) = queue();
        collection::save(
            &*store,
            StorageKeys::PENDING_QUEUE,
            &[CheckInRecord::new("stale").with_created_at(hours_ago(100))],
        )
        .unwrap();

        assert!(queue.enqueue(CheckInRecord::new("new")));

        let persisted: Vec<CheckInRecord> =
            collection::load(&*store, StorageKeys::PENDING_QUEUE).unwrap();
        assert_eq!(names(&persisted), vec!["new"]);
    }

    #[test]
    fn test_peek_does_not_mutate_store() {
        let (store, queue) = queue();
        collection::save(
            &*store,
            StorageKeys::PENDING_QUEUE,
            &[CheckInRecord::new("stale").with_created_at(hours_ago(100))],
        )
        .unwrap();
        let before = store.get(StorageKeys::PENDING_QUEUE).unwrap();

        assert!(queue.peek().is_empty());
        assert_eq!(store.get(StorageKeys::PENDING_QUEUE).unwrap(), before);
    }

    #[test]
    fn test_fifo_order() {
        let (_, queue) = queue();
        for name in ["a", "b", "c", "d"] {
            assert!(queue.enqueue(CheckInRecord::new(name)));
        }
        assert_eq!(names(&queue.peek()), vec!["a", "b", "c", "d"]);
        assert_eq!(queue.pending_count(), 4);
    }

    #[test]
    fn test_malformed_timestamp_is_kept() {
        let (_, queue) = queue();
        assert!(queue.enqueue(CheckInRecord::new("odd").with_created_at("31/12/2023 25:00")));
        assert!(queue.enqueue(CheckInRecord::new("next")));
        assert_eq!(names(&queue.peek()), vec!["odd", "next"]);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (_, queue) = queue();
        queue.enqueue(CheckInRecord::new("a"));

        queue.clear().unwrap();
        assert!(queue.peek().is_empty());
        queue.clear().unwrap();
        assert!(queue.peek().is_empty());
    }

    #[test]
    fn test_enqueue_reports_quota_failure() {
        let store = Arc::new(MemoryStore::with_quota(300));
        let queue = PendingQueue::new(store);

        assert!(queue.enqueue(CheckInRecord::new("a")));
        let big = CheckInRecord::new("b").with_localidad("x".repeat(500));
        assert!(!queue.enqueue(big));
        assert_eq!(names(&queue.peek()), vec!["a"]);
    }

    #[test]
    fn test_writeback_drops_consumed_prefix() {
        let (_, queue) = queue();
        for name in ["a", "b", "c"] {
            queue.enqueue(CheckInRecord::new(name));
        }
        let snapshot = queue.peek();

        assert_eq!(queue.writeback(1, &snapshot).unwrap(), 2);
        assert_eq!(names(&queue.peek()), vec!["b", "c"]);
    }

    #[test]
    fn test_writeback_keeps_records_enqueued_during_drain() {
        let (_, queue) = queue();
        queue.enqueue(CheckInRecord::new("a"));
        queue.enqueue(CheckInRecord::new("b"));
        let snapshot = queue.peek();

        queue.enqueue(CheckInRecord::new("late"));

        queue.writeback(2, &snapshot).unwrap();
        assert_eq!(names(&queue.peek()), vec!["late"]);
    }

    #[test]
    fn test_writeback_removes_one_duplicate_per_delivery() {
        let (_, queue) = queue();
        let dup = CheckInRecord::new("dup").with_created_at(hours_ago(1));
        queue.enqueue(dup.clone());
        queue.enqueue(dup.clone());
        let snapshot = queue.peek();

        queue.writeback(1, &snapshot).unwrap();
        assert_eq!(queue.peek(), vec![dup]);
    }

    #[test]
    fn test_writeback_after_clear_does_not_resurrect() {
        let (_, queue) = queue();
        queue.enqueue(CheckInRecord::new("a"));
        queue.enqueue(CheckInRecord::new("b"));
        let snapshot = queue.peek();

        queue.clear().unwrap();
        queue.writeback(1, &snapshot).unwrap();
        assert!(queue.peek().is_empty());
    }

    #[test]
    fn test_legacy_array_is_read() {
        let (store, queue) = queue();
        let legacy = serde_json::to_string(&[CheckInRecord::new("legacy")]).unwrap();
        store.set(StorageKeys::PENDING_QUEUE, &legacy).unwrap();

        assert_eq!(names(&queue.peek()), vec!["legacy"]);
        assert!(queue.enqueue(CheckInRecord::new("new")));
        assert_eq!(names(&queue.peek()), vec!["legacy", "new"]);
    }

    #[test]
    fn test_newer_schema_is_not_overwritten() {
        let (store, queue) = queue();
        let future = r#"{"version":9,"items":[{"nombre":"from the future"}]}"#;
        store.set(StorageKeys::PENDING_QUEUE, future).unwrap();

        assert!(queue.peek().is_empty());
        assert!(!queue.enqueue(CheckInRecord::new("a")));
        assert!(matches!(
            queue.writeback(0, &[]),
            Err(OutboxError::UnsupportedVersion { found: 9, .. })
        ));
        assert_eq!(store.get(StorageKeys::PENDING_QUEUE).unwrap().as_deref(), Some(future));
    }

    #[test]
    fn test_corrupt_queue_is_replaced_on_enqueue() {
        let (store, queue) = queue();
        store.set(StorageKeys::PENDING_QUEUE, "{garbage").unwrap();

        assert!(queue.peek().is_empty());
        assert!(queue.enqueue(CheckInRecord::new("a")));
        assert_eq!(names(&queue.peek()), vec!["a"]);
    }

    #[test]
    fn test_custom_retention() {
        let store = Arc::new(MemoryStore::new());
        let queue = PendingQueue::with_retention(store, Duration::from_secs(3600));

        queue.enqueue(CheckInRecord::new("two hours").with_created_at(hours_ago(2)));
        assert!(queue.peek().is_empty());
        assert_eq!(queue.retention(), Duration::from_secs(3600));
    }

    #[test]
    fn test_concurrent_capture_and_relay_processes_lose_nothing() {
        const TOTAL: usize = 100;
        let dir = tempdir().unwrap();
        let path = dir.path().join("kiosk.sqlite");
        let capture = PendingQueue::new(Arc::new(SqliteStore::open(&path).unwrap()));
        let relay = PendingQueue::new(Arc::new(SqliteStore::open(&path).unwrap()));

        let mut delivered = std::thread::scope(|s| {
            let producer = s.spawn(|| {
                for i in 0..TOTAL {
                    assert!(capture.enqueue(CheckInRecord::new(format!("guest-{:03}", i))));
                }
            });

            let mut delivered = Vec::new();
            loop {
                let finished = producer.is_finished();
                let snapshot = relay.peek();
                let consumed = snapshot.len().min(2);
                if consumed == 0 {
                    if finished {
                        break;
                    }
                    std::thread::yield_now();
                    continue;
                }
                relay.writeback(consumed, &snapshot).unwrap();
                delivered.extend(snapshot[..consumed].iter().map(|r| r.nombre.clone()));
            }
            delivered
        });

        delivered.sort();
        delivered.dedup();
        let expected: Vec<String> = (0..TOTAL).map(|i| format!("guest-{:03}", i)).collect();
        assert_eq!(delivered, expected);
        assert!(relay.peek().is_empty());
    }
}
