//! Delivery destination settings.

use crate::OutboxResult;
use kiosk_storage::{DurableStore, StorageKeys};
use std::sync::Arc;

/// Key alias used for share-line encryption when none is configured.
pub const DEFAULT_SHARE_KEY_ALIAS: &str = "kiosk_share_key";

const DEFAULT_SHARE_RETRIES: u32 = 3;
const DEFAULT_SHARE_RETRY_DELAY_MS: u64 = 1000;

/// File-share credentials and write options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareSettings {
    pub user: String,
    pub pass: String,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub atomic: bool,
    pub encrypt: bool,
    pub key_alias: String,
    pub passphrase: String,
    pub protect_document: bool,
    pub document_password: String,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            user: String::new(),
            pass: String::new(),
            retries: DEFAULT_SHARE_RETRIES,
            retry_delay_ms: DEFAULT_SHARE_RETRY_DELAY_MS,
            atomic: true,
            encrypt: false,
            key_alias: DEFAULT_SHARE_KEY_ALIAS.to_string(),
            passphrase: String::new(),
            protect_document: false,
            document_password: String::new(),
        }
    }
}

/// Where and how check-ins are delivered.
///
/// `endpoint_path` doubles as the file-share target: a path shaped like a
/// share selects the file-share writer, anything else is forwarded to the
/// endpoint as `filePath`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub endpoint_url: Option<String>,
    pub endpoint_path: Option<String>,
    pub endpoint_key: Option<String>,
    pub share: ShareSettings,
}

impl DeliveryConfig {
    /// Read the settings keys from the store. Blank values count as unset.
    pub fn from_store(store: &dyn DurableStore) -> OutboxResult<Self> {
        let text = |key: &str| -> OutboxResult<Option<String>> {
            Ok(store
                .get(key)?
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()))
        };

        let defaults = ShareSettings::default();
        let share = ShareSettings {
            user: text(StorageKeys::SHARE_USER)?.unwrap_or_default(),
            pass: text(StorageKeys::SHARE_PASS)?.unwrap_or_default(),
            retries: positive_or(text(StorageKeys::SHARE_RETRIES)?, defaults.retries),
            retry_delay_ms: positive_or(
                text(StorageKeys::SHARE_RETRY_DELAY_MS)?,
                defaults.retry_delay_ms,
            ),
            atomic: text(StorageKeys::SHARE_ATOMIC)?
                .map(|v| v == "true")
                .unwrap_or(defaults.atomic),
            encrypt: text(StorageKeys::SHARE_ENCRYPT)?.as_deref() == Some("true"),
            key_alias: text(StorageKeys::SHARE_KEY_ALIAS)?.unwrap_or(defaults.key_alias),
            passphrase: text(StorageKeys::SHARE_PASSPHRASE)?.unwrap_or_default(),
            protect_document: text(StorageKeys::PROTECT_DOCUMENT)?.as_deref() == Some("true"),
            document_password: text(StorageKeys::DOCUMENT_PASSWORD)?.unwrap_or_default(),
        };

        Ok(Self {
            endpoint_url: text(StorageKeys::ENDPOINT_URL)?,
            endpoint_path: text(StorageKeys::ENDPOINT_PATH)?,
            endpoint_key: text(StorageKeys::ENDPOINT_KEY)?,
            share,
        })
    }
}

/// Parse a positive integer, falling back when missing, invalid or zero.
fn positive_or<T>(raw: Option<String>, fallback: T) -> T
where
    T: std::str::FromStr + PartialEq + Default,
{
    raw.and_then(|v| v.parse::<T>().ok())
        .filter(|v| *v != T::default())
        .unwrap_or(fallback)
}

/// Supplies the delivery settings for one attempt.
pub trait DeliveryConfigSource: Send + Sync {
    fn load(&self) -> OutboxResult<DeliveryConfig>;
}

/// A fixed configuration.
impl DeliveryConfigSource for DeliveryConfig {
    fn load(&self) -> OutboxResult<DeliveryConfig> {
        Ok(self.clone())
    }
}

/// Settings re-read from the durable store on every attempt, so changes
/// apply on the next flush without a restart.
pub struct StoredDeliveryConfig {
    store: Arc<dyn DurableStore>,
}

impl StoredDeliveryConfig {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }
}

impl DeliveryConfigSource for StoredDeliveryConfig {
    fn load(&self) -> OutboxResult<DeliveryConfig> {
        DeliveryConfig::from_store(self.store.as_ref())
    }
}
