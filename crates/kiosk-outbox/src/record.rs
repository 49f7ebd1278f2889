//! Check-in and audit record types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A guest check-in captured at the kiosk.
///
/// Field contents are free text and never validated. `created_at` is set
/// once at capture and only used for expiry accounting; it is kept as the
/// raw string so that a malformed value survives persistence unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRecord {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub cp: String,
    #[serde(default)]
    pub localidad: String,
    #[serde(rename = "calleNumero", default)]
    pub calle_numero: String,
    #[serde(default)]
    pub created_at: String,
    /// Always present on the wire; a missing reason is sent as `""`.
    #[serde(default, with = "empty_as_none")]
    pub motivo: Option<String>,
}

mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<String>::deserialize(d)?.filter(|m| !m.is_empty()))
    }
}

impl CheckInRecord {
    /// Start a record for `nombre`, stamped with the current time.
    pub fn new(nombre: impl Into<String>) -> Self {
        Self {
            nombre: nombre.into(),
            telefono: String::new(),
            email: String::new(),
            cp: String::new(),
            localidad: String::new(),
            calle_numero: String::new(),
            created_at: timestamp(Utc::now()),
            motivo: None,
        }
    }

    pub fn with_telefono(mut self, telefono: impl Into<String>) -> Self {
        self.telefono = telefono.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_cp(mut self, cp: impl Into<String>) -> Self {
        self.cp = cp.into();
        self
    }

    pub fn with_localidad(mut self, localidad: impl Into<String>) -> Self {
        self.localidad = localidad.into();
        self
    }

    pub fn with_calle_numero(mut self, calle_numero: impl Into<String>) -> Self {
        self.calle_numero = calle_numero.into();
        self
    }

    /// An empty reason is the same as none.
    pub fn with_motivo(mut self, motivo: impl Into<String>) -> Self {
        let motivo = motivo.into();
        self.motivo = (!motivo.is_empty()).then_some(motivo);
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }

    /// Whether the record is older than `retention` at `now`.
    ///
    /// An unparsable `created_at` never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match parse_timestamp(&self.created_at) {
            Some(created) => (now - created)
                .to_std()
                .map(|age| age > retention)
                .unwrap_or(false),
            None => false,
        }
    }
}

/// Drop every record older than `retention`, keeping order.
pub(crate) fn retain_fresh(
    records: Vec<CheckInRecord>,
    now: DateTime<Utc>,
    retention: Duration,
) -> Vec<CheckInRecord> {
    records
        .into_iter()
        .filter(|r| !r.is_expired_at(now, retention))
        .collect()
}

/// Parse a capture timestamp.
///
/// Accepts RFC 3339, RFC 2822, and offset-less date-times or plain dates
/// read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let with_offset =
        DateTime::parse_from_rfc3339(raw).or_else(|_| DateTime::parse_from_rfc2822(raw));
    if let Ok(dt) = with_offset {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// ISO-8601 UTC timestamp with millisecond precision.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One delivery outcome (immediate or deferred) in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
    #[serde(rename = "smbUser", default, skip_serializing_if = "Option::is_none")]
    pub smb_user: Option<String>,
}

impl AuditLogEntry {
    /// Entry for `record`, stamped with the current time.
    pub fn for_record(record: &CheckInRecord) -> Self {
        Self {
            ts: timestamp(Utc::now()),
            nombre: Some(record.nombre.clone()),
            motivo: record.motivo.clone(),
            smb_user: None,
        }
    }
}
