//! Process-local store.

use crate::{DurableStore, KeyUpdate, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// In-memory store with an optional byte quota.
///
/// Nothing survives the process. The quota models size-limited backends:
/// a `set` that would push the total size of keys and values past it is
/// rejected and leaves the previous value in place.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used_bytes(data: &BTreeMap<String, String>) -> usize {
        data.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn put(
        &self,
        data: &mut BTreeMap<String, String>,
        key: &str,
        value: &str,
    ) -> StorageResult<()> {
        if let Some(quota) = self.quota_bytes {
            let current = data.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let projected = Self::used_bytes(data) - current + key.len() + value.len();
            if projected > quota {
                return Err(StorageError::WriteRejected(format!(
                    "quota of {} bytes exceeded ({} requested)",
                    quota, projected
                )));
            }
        }
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl DurableStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.put(&mut self.data.lock(), key, value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> KeyUpdate,
    ) -> StorageResult<()> {
        let mut data = self.data.lock();
        match apply(data.get(key).cloned()) {
            KeyUpdate::Keep => Ok(()),
            KeyUpdate::Set(value) => self.put(&mut data, key, &value),
            KeyUpdate::Delete => {
                data.remove(key);
                Ok(())
            }
        }
    }

    fn list_keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .data
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();

        store.set("test_key", "test_value").unwrap();
        assert_eq!(store.get("test_key").unwrap(), Some("test_value".to_string()));

        assert!(store.has("test_key").unwrap());
        assert!(!store.has("nonexistent").unwrap());

        assert!(store.delete("test_key").unwrap());
        assert!(!store.delete("test_key").unwrap());
        assert_eq!(store.get("test_key").unwrap(), None);
    }

    #[test]
    fn test_memory_store_quota_rejects_and_keeps_old_value() {
        let store = MemoryStore::with_quota(16);

        store.set("k", "0123456789").unwrap();
        let err = store.set("k", "0123456789abcdefghij").unwrap_err();
        assert!(matches!(err, StorageError::WriteRejected(_)));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("0123456789"));

        // Replacing with a value of equal size still fits.
        store.set("k", "abcdefghij").unwrap();
    }

    #[test]
    fn test_memory_store_update() {
        let store = MemoryStore::with_quota(16);
        store.set("n", "1").unwrap();

        store
            .update("n", &mut |current| {
                let next = current.unwrap().parse::<u32>().unwrap() + 1;
                KeyUpdate::Set(next.to_string())
            })
            .unwrap();
        assert_eq!(store.get("n").unwrap().as_deref(), Some("2"));

        let err = store
            .update("n", &mut |_| KeyUpdate::Set("x".repeat(64)))
            .unwrap_err();
        assert!(matches!(err, StorageError::WriteRejected(_)));
        assert_eq!(store.get("n").unwrap().as_deref(), Some("2"));

        store.update("n", &mut |_| KeyUpdate::Delete).unwrap();
        assert!(!store.has("n").unwrap());
    }

    #[test]
    fn test_memory_store_prefix_listing() {
        let store = MemoryStore::new();
        store.set("delivery.a", "1").unwrap();
        store.set("delivery.b", "2").unwrap();
        store.set("other", "3").unwrap();

        let keys = store.list_keys_with_prefix("delivery.").unwrap();
        assert_eq!(keys, vec!["delivery.a", "delivery.b"]);
    }
}
