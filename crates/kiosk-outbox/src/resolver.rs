//! Per-attempt choice of delivery transport.

use crate::delivery_config::{DeliveryConfig, DeliveryConfigSource};
use crate::file_share::{FileShareCapability, FileShareWriteRequest};
use crate::record::CheckInRecord;
use crate::sender::EndpointSender;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether `path` names a file share: an `smb://` URL (any case), a UNC
/// path, or anything containing a backslash.
pub fn looks_like_file_share(path: &str) -> bool {
    path.get(..6)
        .map(|scheme| scheme.eq_ignore_ascii_case("smb://"))
        .unwrap_or(false)
        || path.contains('\\')
}

/// Transport chosen for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStrategy {
    /// Write through the file-share capability. The endpoint is never
    /// tried as a fallback.
    FileShare { target: String },
    /// POST to `<url>/append`.
    Endpoint {
        url: String,
        file_path: String,
        api_key: Option<String>,
    },
    /// Nothing configured; the attempt fails without doing anything.
    Unconfigured,
}

impl DeliveryStrategy {
    pub fn resolve(config: &DeliveryConfig) -> Self {
        if let Some(path) = config
            .endpoint_path
            .as_deref()
            .filter(|p| looks_like_file_share(p))
        {
            return Self::FileShare {
                target: path.to_string(),
            };
        }

        match &config.endpoint_url {
            Some(url) => Self::Endpoint {
                url: url.clone(),
                file_path: config.endpoint_path.clone().unwrap_or_default(),
                api_key: config.endpoint_key.clone(),
            },
            None => Self::Unconfigured,
        }
    }
}

/// Something that can try to deliver one record.
#[async_trait]
pub trait Deliverer: Send + Sync {
    /// `true` only when the destination accepted the record.
    async fn attempt(&self, record: &CheckInRecord) -> bool;
}

/// Resolves the strategy from fresh settings on every attempt and runs it.
pub struct DeliveryResolver {
    config_source: Arc<dyn DeliveryConfigSource>,
    endpoint: EndpointSender,
    file_share: FileShareCapability,
}

impl DeliveryResolver {
    pub fn new(
        config_source: Arc<dyn DeliveryConfigSource>,
        endpoint: EndpointSender,
        file_share: FileShareCapability,
    ) -> Self {
        Self {
            config_source,
            endpoint,
            file_share,
        }
    }

    /// Attempt delivery with an explicit configuration.
    pub async fn attempt_with(&self, record: &CheckInRecord, config: &DeliveryConfig) -> bool {
        match DeliveryStrategy::resolve(config) {
            DeliveryStrategy::FileShare { target } => {
                let Some(writer) = self.file_share.resolve() else {
                    debug!("File-share capability unavailable");
                    return false;
                };
                let request = FileShareWriteRequest::for_record(&target, record, &config.share);
                match writer.write_line(&request).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "File-share delivery failed");
                        false
                    }
                }
            }
            DeliveryStrategy::Endpoint {
                url,
                file_path,
                api_key,
            } => match self
                .endpoint
                .send(&url, &file_path, api_key.as_deref(), record)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "Endpoint delivery failed");
                    false
                }
            },
            DeliveryStrategy::Unconfigured => {
                debug!("No delivery destination configured");
                false
            }
        }
    }
}

#[async_trait]
impl Deliverer for DeliveryResolver {
    async fn attempt(&self, record: &CheckInRecord) -> bool {
        match self.config_source.load() {
            Ok(config) => self.attempt_with(record, &config).await,
            Err(e) => {
                warn!(error = %e, "Could not read delivery settings");
                false
            }
        }
    }
}
