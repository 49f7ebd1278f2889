//! One-shot operator commands.

use super::init::build_outbox;
use anyhow::{bail, Context};
use clap::Args;
use kiosk_config_and_utils::Config;
use kiosk_outbox::{CheckInRecord, SubmitOutcome};
use kiosk_storage::{DurableStore, StorageKeys};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const REDACTED: &str = "********";

/// Guest fields for `capture`.
#[derive(Args, Debug)]
pub struct CaptureArgs {
    #[arg(long)]
    pub nombre: String,
    #[arg(long, default_value = "")]
    pub telefono: String,
    #[arg(long, default_value = "")]
    pub email: String,
    #[arg(long, default_value = "")]
    pub cp: String,
    #[arg(long, default_value = "")]
    pub localidad: String,
    #[arg(long, default_value = "")]
    pub calle_numero: String,
    #[arg(long)]
    pub motivo: Option<String>,
}

impl CaptureArgs {
    fn into_record(self) -> CheckInRecord {
        let record = CheckInRecord::new(self.nombre)
            .with_telefono(self.telefono)
            .with_email(self.email)
            .with_cp(self.cp)
            .with_localidad(self.localidad)
            .with_calle_numero(self.calle_numero);
        match self.motivo {
            Some(motivo) => record.with_motivo(motivo),
            None => record,
        }
    }
}

pub async fn capture(
    config: &Config,
    store: Arc<dyn DurableStore>,
    args: CaptureArgs,
) -> anyhow::Result<()> {
    let outbox = build_outbox(config, store)?;
    let outcome = outbox.submit(args.into_record()).await;

    println!("{}", json!({ "outcome": outcome }));
    if outcome == SubmitOutcome::Failed {
        bail!("check-in was neither delivered nor queued");
    }
    Ok(())
}

pub fn print_status(config: &Config, store: Arc<dyn DurableStore>) -> anyhow::Result<()> {
    let outbox = build_outbox(config, store)?;
    println!("{}", serde_json::to_string_pretty(&outbox.status())?);
    Ok(())
}

pub fn print_queue(config: &Config, store: Arc<dyn DurableStore>) -> anyhow::Result<()> {
    let outbox = build_outbox(config, store)?;
    println!("{}", serde_json::to_string_pretty(&outbox.peek())?);
    Ok(())
}

pub fn clear_queue(config: &Config, store: Arc<dyn DurableStore>) -> anyhow::Result<()> {
    build_outbox(config, store)?.clear_queue()?;
    info!("Pending queue cleared");
    Ok(())
}

pub fn export_audit(
    config: &Config,
    store: Arc<dyn DurableStore>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let csv = build_outbox(config, store)?.export_audit_csv();
    match output {
        Some(path) => {
            std::fs::write(path, &csv)
                .with_context(|| format!("writing audit export to {}", path.display()))?;
            info!(path = %path.display(), "Audit log exported");
        }
        None => println!("{}", csv),
    }
    Ok(())
}

pub fn clear_audit(config: &Config, store: Arc<dyn DurableStore>) -> anyhow::Result<()> {
    build_outbox(config, store)?.clear_audit_log()?;
    info!("Audit log cleared");
    Ok(())
}

pub fn show_config(config: &Config, store: &dyn DurableStore) -> anyhow::Result<()> {
    let view = json!({
        "relay": config,
        "delivery": delivery_settings(store)?,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub fn set_delivery_setting(store: &dyn DurableStore, key: &str, value: &str) -> anyhow::Result<()> {
    let Some(full_key) = setting_key(key) else {
        bail!(
            "unknown delivery setting `{}` (expected one of: {})",
            key,
            StorageKeys::DELIVERY_KEYS
                .iter()
                .map(|k| k.trim_start_matches(StorageKeys::DELIVERY_PREFIX))
                .collect::<Vec<_>>()
                .join(", ")
        );
    };
    store.set(full_key, value)?;
    info!(key = full_key, "Delivery setting updated");
    Ok(())
}

/// Accept a setting name with or without the `delivery.` prefix.
fn setting_key(key: &str) -> Option<&'static str> {
    let short = key.trim().trim_start_matches(StorageKeys::DELIVERY_PREFIX);
    StorageKeys::DELIVERY_KEYS
        .into_iter()
        .find(|k| k.trim_start_matches(StorageKeys::DELIVERY_PREFIX) == short)
}

/// Current delivery settings by short name, secrets redacted.
fn delivery_settings(store: &dyn DurableStore) -> anyhow::Result<Map<String, Value>> {
    let mut settings = Map::new();
    for key in StorageKeys::DELIVERY_KEYS {
        let value = match store.get(key)? {
            Some(v) if StorageKeys::SECRET_KEYS.contains(&key) && !v.is_empty() => {
                Value::from(REDACTED)
            }
            Some(v) => Value::from(v),
            None => Value::Null,
        };
        let short = key.trim_start_matches(StorageKeys::DELIVERY_PREFIX);
        settings.insert(short.to_string(), value);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_storage::MemoryStore;

    #[test]
    fn test_setting_key_accepts_short_and_full_names() {
        assert_eq!(setting_key("endpoint_url"), Some(StorageKeys::ENDPOINT_URL));
        assert_eq!(
            setting_key("delivery.share_retries"),
            Some(StorageKeys::SHARE_RETRIES)
        );
        assert_eq!(setting_key("pending_queue_v1"), None);
        assert_eq!(setting_key("nope"), None);
    }

    #[test]
    fn test_set_rejects_unknown_keys() {
        let store = MemoryStore::new();
        assert!(set_delivery_setting(&store, "audit_log_v1", "[]").is_err());
        assert_eq!(store.get(StorageKeys::AUDIT_LOG).unwrap(), None);

        set_delivery_setting(&store, "endpoint_url", "http://collector").unwrap();
        assert_eq!(
            store.get(StorageKeys::ENDPOINT_URL).unwrap().as_deref(),
            Some("http://collector")
        );
    }

    #[test]
    fn test_delivery_settings_redacts_secrets() {
        let store = MemoryStore::new();
        store.set(StorageKeys::ENDPOINT_URL, "http://collector").unwrap();
        store.set(StorageKeys::ENDPOINT_KEY, "s3cret").unwrap();
        store.set(StorageKeys::SHARE_PASS, "").unwrap();

        let settings = delivery_settings(&store).unwrap();
        assert_eq!(settings["endpoint_url"], "http://collector");
        assert_eq!(settings["endpoint_key"], REDACTED);
        assert_eq!(settings["share_pass"], "");
        assert_eq!(settings["share_user"], Value::Null);
        assert_eq!(settings.len(), StorageKeys::DELIVERY_KEYS.len());
    }

    #[test]
    fn test_capture_args_build_record() {
        let record = CaptureArgs {
            nombre: "Ana".into(),
            telefono: "600".into(),
            email: String::new(),
            cp: "08001".into(),
            localidad: String::new(),
            calle_numero: "Mayor 3".into(),
            motivo: None,
        }
        .into_record();

        assert_eq!(record.nombre, "Ana");
        assert_eq!(record.calle_numero, "Mayor 3");
        assert_eq!(record.motivo, None);
        assert!(!record.created_at.is_empty());
    }
}
