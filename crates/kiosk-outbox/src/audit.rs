//! Append-only audit log of delivered and queued check-ins.

use crate::collection::{self, OnCorrupt};
use crate::csv::quote_field;
use crate::record::AuditLogEntry;
use crate::OutboxResult;
use kiosk_storage::{DurableStore, KeyUpdate, StorageKeys};
use std::sync::Arc;
use tracing::{debug, warn};

const CSV_HEADER: &str = "timestamp,nombre,motivo,smbUser";

/// Audit log persisted alongside the pending queue.
///
/// Entries never expire and are never deduplicated. Unlike the queue, an
/// unreadable log is left untouched: appends fail until an operator clears
/// it.
pub struct AuditLog {
    store: Arc<dyn DurableStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// Append an entry. Failures are logged and reported as `false`.
    pub fn append(&self, entry: AuditLogEntry) -> bool {
        match self.try_append(entry) {
            Ok(len) => {
                debug!(entries = len, "Appended audit entry");
                true
            }
            Err(e) => {
                warn!(error = %e, "Dropped audit entry");
                false
            }
        }
    }

    fn try_append(&self, entry: AuditLogEntry) -> OutboxResult<usize> {
        collection::rewrite(
            self.store.as_ref(),
            StorageKeys::AUDIT_LOG,
            OnCorrupt::Refuse,
            |mut entries: Vec<AuditLogEntry>| {
                entries.push(entry.clone());
                let len = entries.len();
                (entries, len)
            },
        )
    }

    /// All entries in insertion order. Unreadable data reads as empty.
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        collection::load(self.store.as_ref(), StorageKeys::AUDIT_LOG).unwrap_or_else(|e| {
            warn!(error = %e, "Audit log unreadable; treating as empty");
            Vec::new()
        })
    }

    /// Render the whole log as CSV.
    pub fn export_csv(&self) -> String {
        render_csv(&self.entries())
    }

    /// Remove every entry.
    pub fn clear(&self) -> OutboxResult<()> {
        self.store.update(StorageKeys::AUDIT_LOG, &mut |_| KeyUpdate::Delete)?;
        debug!("Cleared audit log");
        Ok(())
    }
}

/// Header line plus one fully quoted row per entry, joined by `\n` with no
/// trailing newline.
pub(crate) fn render_csv(entries: &[AuditLogEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for entry in entries {
        let cols = [
            entry.ts.as_str(),
            entry.nombre.as_deref().unwrap_or(""),
            entry.motivo.as_deref().unwrap_or(""),
            entry.smb_user.as_deref().unwrap_or(""),
        ];
        let row: Vec<String> = cols.iter().map(|c| quote_field(c)).collect();
        lines.push(row.join(","));
    }

    lines.join("\n")
}
