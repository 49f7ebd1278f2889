//! Storage key constants.

/// Well-known keys in the durable store.
pub struct StorageKeys;

impl StorageKeys {
    /// Pending delivery queue (versioned JSON envelope)
    pub const PENDING_QUEUE: &'static str = "pending_queue_v1";

    /// Append-only audit log (versioned JSON envelope)
    pub const AUDIT_LOG: &'static str = "audit_log_v1";

    /// Prefix shared by every delivery setting
    pub const DELIVERY_PREFIX: &'static str = "delivery.";

    /// Collection endpoint base URL
    pub const ENDPOINT_URL: &'static str = "delivery.endpoint_url";

    /// Target file path; doubles as the file-share URL
    pub const ENDPOINT_PATH: &'static str = "delivery.endpoint_path";

    /// Optional API key sent as `x-api-key`
    pub const ENDPOINT_KEY: &'static str = "delivery.endpoint_key";

    pub const SHARE_USER: &'static str = "delivery.share_user";
    pub const SHARE_PASS: &'static str = "delivery.share_pass";
    pub const SHARE_RETRIES: &'static str = "delivery.share_retries";
    pub const SHARE_RETRY_DELAY_MS: &'static str = "delivery.share_retry_delay_ms";
    pub const SHARE_ATOMIC: &'static str = "delivery.share_atomic";
    pub const SHARE_ENCRYPT: &'static str = "delivery.share_encrypt";
    pub const SHARE_KEY_ALIAS: &'static str = "delivery.share_key_alias";
    pub const SHARE_PASSPHRASE: &'static str = "delivery.share_passphrase";
    pub const PROTECT_DOCUMENT: &'static str = "delivery.protect_document";
    pub const DOCUMENT_PASSWORD: &'static str = "delivery.document_password";

    /// Every delivery setting key, in display order.
    pub const DELIVERY_KEYS: [&'static str; 13] = [
        Self::ENDPOINT_URL,
        Self::ENDPOINT_PATH,
        Self::ENDPOINT_KEY,
        Self::SHARE_USER,
        Self::SHARE_PASS,
        Self::SHARE_RETRIES,
        Self::SHARE_RETRY_DELAY_MS,
        Self::SHARE_ATOMIC,
        Self::SHARE_ENCRYPT,
        Self::SHARE_KEY_ALIAS,
        Self::SHARE_PASSPHRASE,
        Self::PROTECT_DOCUMENT,
        Self::DOCUMENT_PASSWORD,
    ];

    /// Keys whose values must never be printed.
    pub const SECRET_KEYS: [&'static str; 4] = [
        Self::ENDPOINT_KEY,
        Self::SHARE_PASS,
        Self::SHARE_PASSPHRASE,
        Self::DOCUMENT_PASSWORD,
    ];
}
