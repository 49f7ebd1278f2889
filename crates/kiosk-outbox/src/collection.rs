//! Versioned JSON envelope for persisted collections.
//!
//! Collections are stored as `{"version":1,"items":[...]}`. A bare JSON
//! array is the unversioned layout written by earlier kiosk builds and is
//! still read as version 0.

use crate::{OutboxError, OutboxResult};
use kiosk_storage::{DurableStore, KeyUpdate, StorageError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Schema version written by this build.
pub(crate) const COLLECTION_VERSION: u64 = 1;

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    version: u64,
    items: &'a [T],
}

#[derive(Deserialize)]
struct EnvelopeIn {
    version: u64,
    #[serde(default)]
    items: Value,
}

/// How a rewrite treats stored data it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnCorrupt {
    /// Start over from an empty list.
    Replace,
    /// Fail and leave the stored data alone.
    Refuse,
}

/// Read the collection stored under `key`. A missing key is an empty list.
pub(crate) fn load<T: DeserializeOwned>(
    store: &dyn DurableStore,
    key: &str,
) -> OutboxResult<Vec<T>> {
    decode(key, store.get(key)?.as_deref())
}

fn decode<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> OutboxResult<Vec<T>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let items = match serde_json::from_str::<Value>(raw)? {
        legacy @ Value::Array(_) => legacy,
        other => {
            let envelope: EnvelopeIn = serde_json::from_value(other)?;
            if envelope.version > COLLECTION_VERSION {
                return Err(OutboxError::UnsupportedVersion {
                    key: key.to_string(),
                    found: envelope.version,
                    supported: COLLECTION_VERSION,
                });
            }
            match envelope.items {
                Value::Null => return Ok(Vec::new()),
                items => items,
            }
        }
    };

    Ok(serde_json::from_value(items)?)
}

fn encode<T: Serialize>(items: &[T]) -> OutboxResult<String> {
    Ok(serde_json::to_string(&EnvelopeOut {
        version: COLLECTION_VERSION,
        items,
    })?)
}

/// Replace the collection stored under `key` in a single write.
#[cfg(test)]
pub(crate) fn save<T: Serialize>(
    store: &dyn DurableStore,
    key: &str,
    items: &[T],
) -> OutboxResult<()> {
    store.set(key, &encode(items)?)?;
    Ok(())
}

/// Read, transform and write back the collection under `key` as one store
/// transaction.
///
/// Data written by a newer build is never overwritten. `apply` may run
/// again if the store retries the transaction, so it must not consume its
/// captures.
pub(crate) fn rewrite<T, R>(
    store: &dyn DurableStore,
    key: &str,
    on_corrupt: OnCorrupt,
    mut apply: impl FnMut(Vec<T>) -> (Vec<T>, R),
) -> OutboxResult<R>
where
    T: Serialize + DeserializeOwned,
{
    let mut outcome: Option<OutboxResult<R>> = None;

    store.update(key, &mut |raw| {
        let items = match decode(key, raw.as_deref()) {
            Err(OutboxError::Json(e)) if on_corrupt == OnCorrupt::Replace => {
                warn!(key, error = %e, "Discarding corrupt collection");
                Ok(Vec::new())
            }
            other => other,
        };
        let step = items.and_then(|items| {
            let (items, result) = apply(items);
            Ok((encode(&items)?, result))
        });

        match step {
            Ok((body, result)) => {
                outcome = Some(Ok(result));
                KeyUpdate::Set(body)
            }
            Err(e) => {
                outcome = Some(Err(e));
                KeyUpdate::Keep
            }
        }
    })?;

    outcome.unwrap_or_else(|| {
        Err(OutboxError::Storage(StorageError::WriteRejected(format!(
            "{} was not updated",
            key
        ))))
    })
}
