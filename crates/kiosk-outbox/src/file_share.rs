//! File-share delivery seam.
//!
//! This crate only builds the line and the write request; the write itself
//! belongs to a host capability that may or may not be present.

use crate::csv::escape_field;
use crate::delivery_config::ShareSettings;
use crate::record::CheckInRecord;
use crate::OutboxResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a file-share writer needs to append one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileShareWriteRequest {
    pub url: String,
    pub user: String,
    pub pass: String,
    pub line: String,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub atomic: bool,
    pub encrypt: bool,
    pub key_alias: String,
    pub passphrase: String,
    #[serde(rename = "protectExcel")]
    pub protect_document: bool,
    #[serde(rename = "excelPassword")]
    pub document_password: String,
}

impl FileShareWriteRequest {
    pub fn for_record(target: &str, record: &CheckInRecord, settings: &ShareSettings) -> Self {
        Self {
            url: target.to_string(),
            user: settings.user.clone(),
            pass: settings.pass.clone(),
            line: build_share_line(record),
            retries: settings.retries,
            retry_delay_ms: settings.retry_delay_ms,
            atomic: settings.atomic,
            encrypt: settings.encrypt,
            key_alias: settings.key_alias.clone(),
            passphrase: settings.passphrase.clone(),
            protect_document: settings.protect_document,
            document_password: settings.document_password.clone(),
        }
    }
}

/// One comma-delimited line in the fixed column order
/// `created_at, nombre, telefono, email, cp, localidad, calleNumero, motivo`.
///
/// Fields containing a delimiter, quote or line break are quoted so the
/// line keeps exactly eight columns.
pub fn build_share_line(record: &CheckInRecord) -> String {
    [
        record.created_at.as_str(),
        record.nombre.as_str(),
        record.telefono.as_str(),
        record.email.as_str(),
        record.cp.as_str(),
        record.localidad.as_str(),
        record.calle_numero.as_str(),
        record.motivo.as_deref().unwrap_or(""),
    ]
    .iter()
    .map(|field| escape_field(field))
    .collect::<Vec<_>>()
    .join(",")
}

/// Host capability that appends lines to a file share.
#[async_trait]
pub trait FileShareWriter: Send + Sync {
    /// Append `request.line` to the target, honouring the request's retry
    /// and atomicity options.
    async fn write_line(&self, request: &FileShareWriteRequest) -> OutboxResult<()>;

    /// Whether the capability can be used right now.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Presence of the file-share capability, resolved once per attempt.
#[derive(Clone, Default)]
pub enum FileShareCapability {
    Available(Arc<dyn FileShareWriter>),
    #[default]
    Unavailable,
}

impl FileShareCapability {
    /// The writer, if present and ready.
    pub fn resolve(&self) -> Option<&Arc<dyn FileShareWriter>> {
        match self {
            Self::Available(writer) if writer.is_ready() => Some(writer),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.resolve().is_some()
    }
}

impl std::fmt::Debug for FileShareCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(_) => f.write_str("Available"),
            Self::Unavailable => f.write_str("Unavailable"),
        }
    }
}
