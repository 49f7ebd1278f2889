//! Relay initialization.

use crate::connectivity::ConnectivityMonitor;
use kiosk_config_and_utils::Config;
use kiosk_outbox::{
    CheckInOutbox, DeliveryResolver, EndpointSender, FileShareCapability, FlushSchedulerConfig,
    MountedShareWriter, StoredDeliveryConfig,
};
use kiosk_storage::DurableStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Wire the outbox against `store` using the relay config.
pub(crate) fn build_outbox(
    config: &Config,
    store: Arc<dyn DurableStore>,
) -> anyhow::Result<CheckInOutbox> {
    let file_share = match &config.share_mount_root {
        Some(root) => {
            let writer = MountedShareWriter::new(root.clone());
            if !root.is_dir() {
                warn!(mount_root = %root.display(), "Share mount root is not a directory yet");
            }
            FileShareCapability::Available(Arc::new(writer))
        }
        None => FileShareCapability::Unavailable,
    };

    let resolver = DeliveryResolver::new(
        Arc::new(StoredDeliveryConfig::new(store.clone())),
        EndpointSender::new(config.endpoint_timeout())?,
        file_share,
    );

    Ok(CheckInOutbox::new(
        store,
        Arc::new(resolver),
        config.retention(),
    ))
}

/// Run the flush scheduler and connectivity probe until Ctrl-C.
pub async fn run_relay(config: &Config, store: Arc<dyn DurableStore>) -> anyhow::Result<()> {
    info!(
        flush_interval_secs = config.flush_interval_secs,
        retention_hours = config.retention_hours,
        share_mount = config.share_mount_root.is_some(),
        "Starting kiosk relay"
    );

    let outbox = build_outbox(config, store.clone())?;
    let scheduler = Arc::new(outbox.scheduler(FlushSchedulerConfig {
        interval: config.flush_interval(),
    }));
    let scheduler_task = scheduler.start()?;

    let monitor = ConnectivityMonitor::new(
        store,
        scheduler.handle(),
        config.connectivity_probe_interval(),
        config.endpoint_timeout(),
    );
    let monitor_task = tokio::spawn(monitor.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    monitor_task.abort();
    scheduler.shutdown();
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "Flush scheduler task ended abnormally");
    }

    let status = outbox.status();
    info!(
        pending = status.pending,
        audit_entries = status.audit_entries,
        "Kiosk relay stopped"
    );
    Ok(())
}
