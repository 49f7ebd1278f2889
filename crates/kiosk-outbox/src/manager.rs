//! Capture-side facade over the queue, audit log and resolver.

use crate::audit::AuditLog;
use crate::queue::PendingQueue;
use crate::record::{AuditLogEntry, CheckInRecord};
use crate::resolver::Deliverer;
use crate::scheduler::{FlushScheduler, FlushSchedulerConfig};
use crate::OutboxResult;
use kiosk_storage::DurableStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What happened to a submitted check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Accepted by the destination right away.
    Delivered,
    /// Queued for a later flush.
    Queued,
    /// Neither delivered nor queued.
    Failed,
}

/// Point-in-time counts for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutboxStatus {
    pub pending: usize,
    pub audit_entries: usize,
}

/// Entry point for capture and operator collaborators.
pub struct CheckInOutbox {
    queue: Arc<PendingQueue>,
    audit: AuditLog,
    deliverer: Arc<dyn Deliverer>,
}

impl CheckInOutbox {
    pub fn new(
        store: Arc<dyn DurableStore>,
        deliverer: Arc<dyn Deliverer>,
        retention: Duration,
    ) -> Self {
        Self {
            queue: Arc::new(PendingQueue::with_retention(store.clone(), retention)),
            audit: AuditLog::new(store),
            deliverer,
        }
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.queue
    }

    /// Try to deliver now; queue on failure.
    ///
    /// Every `Delivered` or `Queued` outcome appends exactly one audit
    /// entry. `Failed` appends none.
    pub async fn submit(&self, record: CheckInRecord) -> SubmitOutcome {
        if self.deliverer.attempt(&record).await {
            self.audit.append(AuditLogEntry::for_record(&record));
            info!("Check-in delivered");
            return SubmitOutcome::Delivered;
        }

        let entry = AuditLogEntry::for_record(&record);
        if self.queue.enqueue(record) {
            self.audit.append(entry);
            info!("Check-in queued for later delivery");
            SubmitOutcome::Queued
        } else {
            warn!("Check-in could not be delivered or queued");
            SubmitOutcome::Failed
        }
    }

    pub fn enqueue(&self, record: CheckInRecord) -> bool {
        self.queue.enqueue(record)
    }

    pub fn peek(&self) -> Vec<CheckInRecord> {
        self.queue.peek()
    }

    pub fn clear_queue(&self) -> OutboxResult<()> {
        self.queue.clear()
    }

    pub fn append_audit_entry(&self, entry: AuditLogEntry) -> bool {
        self.audit.append(entry)
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit.entries()
    }

    pub fn export_audit_csv(&self) -> String {
        self.audit.export_csv()
    }

    pub fn clear_audit_log(&self) -> OutboxResult<()> {
        self.audit.clear()
    }

    pub fn status(&self) -> OutboxStatus {
        OutboxStatus {
            pending: self.queue.pending_count(),
            audit_entries: self.audit.entries().len(),
        }
    }

    /// A scheduler draining this outbox's queue through the same deliverer.
    pub fn scheduler(&self, config: FlushSchedulerConfig) -> FlushScheduler {
        FlushScheduler::new(self.queue.clone(), self.deliverer.clone(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::DEFAULT_RETENTION;
    use crate::scheduler::{DrainOutcome, FlushTrigger};
    use async_trait::async_trait;
    use kiosk_storage::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Switch(AtomicBool);

    impl Switch {
        fn new(online: bool) -> Arc<Self> {
            Arc::new(Self(AtomicBool::new(online)))
        }

        fn set(&self, online: bool) {
            self.0.store(online, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Deliverer for Switch {
        async fn attempt(&self, _record: &CheckInRecord) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn outbox(store: Arc<dyn DurableStore>, deliverer: Arc<Switch>) -> CheckInOutbox {
        CheckInOutbox::new(store, deliverer, DEFAULT_RETENTION)
    }

    #[tokio::test]
    async fn test_submit_online_delivers_and_audits() {
        let outbox = outbox(Arc::new(MemoryStore::new()), Switch::new(true));

        let outcome = outbox
            .submit(CheckInRecord::new("Ana").with_motivo("spa"))
            .await;

        assert_eq!(outcome, SubmitOutcome::Delivered);
        assert!(outbox.peek().is_empty());
        let entries = outbox.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].nombre.as_deref(), Some("Ana"));
        assert_eq!(entries[0].motivo.as_deref(), Some("spa"));
    }

    #[tokio::test]
    async fn test_submit_offline_queues_and_audits() {
        let outbox = outbox(Arc::new(MemoryStore::new()), Switch::new(false));

        assert_eq!(
            outbox.submit(CheckInRecord::new("Ana")).await,
            SubmitOutcome::Queued
        );
        assert_eq!(
            outbox.status(),
            OutboxStatus {
                pending: 1,
                audit_entries: 1
            }
        );
    }

    #[tokio::test]
    async fn test_submit_failure_is_not_audited() {
        let store = Arc::new(MemoryStore::with_quota(16));
        let outbox = outbox(store, Switch::new(false));

        assert_eq!(
            outbox.submit(CheckInRecord::new("Ana")).await,
            SubmitOutcome::Failed
        );
        assert!(outbox.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_every_capture_is_audited_once() {
        let switch = Switch::new(false);
        let outbox = outbox(Arc::new(MemoryStore::new()), switch.clone());

        outbox.submit(CheckInRecord::new("a")).await;
        outbox.submit(CheckInRecord::new("b")).await;
        switch.set(true);
        outbox.submit(CheckInRecord::new("c")).await;

        let names: Vec<_> = outbox
            .audit_entries()
            .into_iter()
            .filter_map(|e| e.nombre)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        // Draining the queue later does not add more entries.
        let scheduler = outbox.scheduler(FlushSchedulerConfig::default());
        assert!(matches!(
            scheduler.drain(FlushTrigger::ConnectivityRestored).await,
            DrainOutcome::Completed { delivered: 2, .. }
        ));
        assert!(outbox.peek().is_empty());
        assert_eq!(outbox.audit_entries().len(), 3);
    }

    #[tokio::test]
    async fn test_operator_actions() {
        let outbox = outbox(Arc::new(MemoryStore::new()), Switch::new(false));
        assert!(outbox.enqueue(CheckInRecord::new("a")));
        assert!(outbox.append_audit_entry(AuditLogEntry {
            ts: "2024-05-01T10:00:00.000Z".into(),
            nombre: Some("a".into()),
            motivo: None,
            smb_user: None,
        }));

        assert!(outbox.export_audit_csv().contains("\"a\""));

        outbox.clear_queue().unwrap();
        outbox.clear_queue().unwrap();
        outbox.clear_audit_log().unwrap();
        assert_eq!(
            outbox.status(),
            OutboxStatus {
                pending: 0,
                audit_entries: 0
            }
        );
    }
}
