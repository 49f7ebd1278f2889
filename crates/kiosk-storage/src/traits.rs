//! Storage trait definitions.

use crate::StorageResult;

/// What [`DurableStore::update`] does with a key after inspecting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyUpdate {
    /// Leave the stored value as it is.
    Keep,
    /// Replace the value.
    Set(String),
    /// Remove the key.
    Delete,
}

/// Trait for durable key-value backends.
///
/// Each `set` must be atomic: after a crash a key holds either the old or
/// the new value, never a mix.
pub trait DurableStore: Send + Sync {
    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns whether the key existed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Read-modify-write `key` as one atomic step.
    ///
    /// `apply` sees the current value and decides the new one. No other
    /// writer, in this process or another one sharing the backend, can
    /// change the key between the read and the write.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> KeyUpdate,
    ) -> StorageResult<()>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// List all keys that start with a given prefix.
    fn list_keys_with_prefix(&self, _prefix: &str) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }
}
