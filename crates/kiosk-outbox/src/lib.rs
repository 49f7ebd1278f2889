//! Durable delivery of kiosk check-in records.
//!
//! This crate provides:
//! - PendingQueue: expiring FIFO of records awaiting delivery, persisted in a DurableStore
//! - AuditLog: append-only record of every delivered or queued check-in
//! - DeliveryResolver: picks the endpoint or file-share transport per attempt
//! - FlushScheduler: drains the queue on startup, on reconnect and on a timer
//! - CheckInOutbox: capture-side facade tying the pieces together

mod audit;
mod collection;
mod csv;
mod delivery_config;
mod error;
mod file_share;
mod manager;
mod mounted_share;
mod queue;
mod record;
mod resolver;
mod scheduler;
mod sender;

pub use audit::AuditLog;
pub use delivery_config::{
    DeliveryConfig, DeliveryConfigSource, ShareSettings, StoredDeliveryConfig,
    DEFAULT_SHARE_KEY_ALIAS,
};
pub use error::{OutboxError, OutboxResult};
pub use file_share::{build_share_line, FileShareCapability, FileShareWriteRequest, FileShareWriter};
pub use manager::{CheckInOutbox, OutboxStatus, SubmitOutcome};
pub use mounted_share::{open_sealed_line, seal_line, MountedShareWriter};
pub use queue::{PendingQueue, DEFAULT_RETENTION};
pub use record::{parse_timestamp, AuditLogEntry, CheckInRecord};
pub use resolver::{looks_like_file_share, Deliverer, DeliveryResolver, DeliveryStrategy};
pub use scheduler::{
    DrainOutcome, FlushHandle, FlushScheduler, FlushSchedulerConfig, FlushTrigger,
};
pub use sender::{append_url, EndpointSender};
