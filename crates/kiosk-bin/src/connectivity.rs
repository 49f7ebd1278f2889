//! Connectivity probe that turns offline-to-online transitions into flush
//! triggers.

use kiosk_outbox::{DeliveryConfig, DeliveryStrategy, FlushHandle};
use kiosk_storage::DurableStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

const SMB_PORT: u16 = 445;

/// Host and port that must be reachable for the current delivery strategy.
pub(crate) fn probe_target(config: &DeliveryConfig) -> Option<(String, u16)> {
    match DeliveryStrategy::resolve(config) {
        DeliveryStrategy::Endpoint { url, .. } => {
            let parsed = Url::parse(&url).ok()?;
            let host = parsed.host_str()?.to_string();
            let port = parsed.port_or_known_default()?;
            Some((host, port))
        }
        DeliveryStrategy::FileShare { target } => {
            let host = match Url::parse(&target) {
                Ok(parsed) if parsed.scheme().eq_ignore_ascii_case("smb") => {
                    parsed.host_str()?.to_string()
                }
                _ => target
                    .trim_start_matches(&['\\', '/'][..])
                    .split(&['\\', '/'][..])
                    .next()
                    .filter(|h| !h.is_empty())?
                    .to_string(),
            };
            Some((host, SMB_PORT))
        }
        DeliveryStrategy::Unconfigured => None,
    }
}

async fn is_reachable(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Periodically probes the delivery destination.
pub struct ConnectivityMonitor {
    store: Arc<dyn DurableStore>,
    handle: FlushHandle,
    interval: Duration,
    timeout: Duration,
}

impl ConnectivityMonitor {
    pub fn new(
        store: Arc<dyn DurableStore>,
        handle: FlushHandle,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            handle,
            interval,
            timeout,
        }
    }

    /// Probe forever. The first result only sets the baseline; the startup
    /// drain covers that case.
    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut online: Option<bool> = None;

        loop {
            ticker.tick().await;

            let config = match DeliveryConfig::from_store(self.store.as_ref()) {
                Ok(config) => config,
                Err(e) => {
                    warn!(error = %e, "Could not read delivery settings for probe");
                    continue;
                }
            };
            let Some((host, port)) = probe_target(&config) else {
                online = None;
                continue;
            };

            let reachable = is_reachable(&host, port, self.timeout).await;
            match (online, reachable) {
                (Some(false), true) => {
                    info!(%host, port, "Destination reachable again");
                    if !self.handle.notify_connectivity_restored() {
                        debug!("Flush scheduler gone; stopping probe");
                        return;
                    }
                }
                (Some(true) | None, false) => info!(%host, port, "Destination unreachable"),
                _ => {}
            }
            online = Some(reachable);
        }
    }
}
