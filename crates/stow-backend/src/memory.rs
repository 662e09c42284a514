use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::error::{BackendError, BackendResult};
use crate::traits::{remove_each, StorageBackend};

/// Backend operation, used to target injected failures and count calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
    Remove,
    Keys,
    MultiRemove,
    Clear,
}

#[derive(Debug)]
struct Fault {
    operation: Operation,
    key: Option<String>,
    message: String,
    once: bool,
}

/// In-memory, HashMap-based backend.
///
/// Stands in for the mobile native store in tests so nothing depends on a
/// real host bridge. Deterministic: keys are listed in sorted order. Failures
/// can be injected per operation (and optionally per key) to exercise error
/// paths, and raw records can be planted to simulate corruption.
pub struct InMemoryBackend {
    records: RwLock<HashMap<String, String>>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<HashMap<Operation, usize>>,
    native_bulk_remove: bool,
}

impl InMemoryBackend {
    /// Create a new empty backend with native bulk removal.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            faults: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            native_bulk_remove: true,
        }
    }

    /// Toggle native bulk removal. When disabled, `multi_remove` behaves like
    /// a desktop store and issues one removal per key.
    pub fn with_native_bulk_remove(mut self, enabled: bool) -> Self {
        self.native_bulk_remove = enabled;
        self
    }

    /// Make the next call to `operation` fail with `message`.
    pub fn fail_next(&self, operation: Operation, message: impl Into<String>) {
        self.push_fault(operation, None, message.into(), true);
    }

    /// Make every call to `operation` on `key` fail with `message`.
    pub fn fail_key(&self, operation: Operation, key: impl Into<String>, message: impl Into<String>) {
        self.push_fault(operation, Some(key.into()), message.into(), false);
    }

    /// Drop all pending injected failures.
    pub fn clear_faults(&self) {
        self.faults.lock().expect("lock poisoned").clear();
    }

    /// Store a raw record, bypassing any encoding.
    pub fn put_raw(&self, key: impl Into<String>, raw: impl Into<String>) {
        self.records
            .write()
            .expect("lock poisoned")
            .insert(key.into(), raw.into());
    }

    /// Raw record currently stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.read().expect("lock poisoned").get(key).cloned()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// How many times `operation` has been invoked.
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .expect("lock poisoned")
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    fn push_fault(&self, operation: Operation, key: Option<String>, message: String, once: bool) {
        self.faults.lock().expect("lock poisoned").push(Fault {
            operation,
            key,
            message,
            once,
        });
    }

    // Record the call, then consume a matching fault if one is armed.
    fn enter(&self, operation: Operation, key: Option<&str>) -> BackendResult<()> {
        *self
            .calls
            .lock()
            .expect("lock poisoned")
            .entry(operation)
            .or_insert(0) += 1;

        let mut faults = self.faults.lock().expect("lock poisoned");
        let hit = faults.iter().position(|f| {
            f.operation == operation
                && match (&f.key, key) {
                    (None, _) => true,
                    (Some(fk), Some(k)) => fk == k,
                    (Some(_), None) => false,
                }
        });
        match hit {
            Some(idx) if faults[idx].once => Err(BackendError::Injected(faults.remove(idx).message)),
            Some(idx) => Err(BackendError::Injected(faults[idx].message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_item(&self, key: &str) -> BackendResult<Option<String>> {
        self.enter(Operation::Get, Some(key))?;
        Ok(self.raw(key))
    }

    async fn set_item(&self, key: &str, value: String) -> BackendResult<()> {
        self.enter(Operation::Set, Some(key))?;
        self.put_raw(key, value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> BackendResult<()> {
        self.enter(Operation::Remove, Some(key))?;
        self.records.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn get_all_keys(&self) -> BackendResult<Vec<String>> {
        self.enter(Operation::Keys, None)?;
        let mut keys: Vec<String> = self
            .records
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn multi_remove(&self, keys: &[String]) -> BackendResult<()> {
        if !self.native_bulk_remove {
            return remove_each(self, keys).await;
        }
        self.enter(Operation::MultiRemove, None)?;
        let mut records = self.records.write().expect("lock poisoned");
        for key in keys {
            records.remove(key);
        }
        Ok(())
    }

    async fn clear(&self) -> BackendResult<()> {
        self.enter(Operation::Clear, None)?;
        self.records.write().expect("lock poisoned").clear();
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("record_count", &self.len())
            .field("native_bulk_remove", &self.native_bulk_remove)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let backend = InMemoryBackend::new();
        backend.set_item("a", "1".into()).await.unwrap();
        assert_eq!(backend.get_item("a").await.unwrap().as_deref(), Some("1"));

        backend.remove_item("a").await.unwrap();
        assert!(backend.get_item("a").await.unwrap().is_none());
        // Removing a missing key is not an error.
        backend.remove_item("a").await.unwrap();
    }

    #[tokio::test]
    async fn keys_are_sorted() {
        let backend = InMemoryBackend::new();
        for key in ["c", "a", "b"] {
            backend.set_item(key, "x".into()).await.unwrap();
        }
        assert_eq!(backend.get_all_keys().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn fail_next_fires_once() {
        let backend = InMemoryBackend::new();
        backend.fail_next(Operation::Set, "disk full");

        let err = backend.set_item("a", "1".into()).await.unwrap_err();
        assert_eq!(err.to_string(), "injected failure: disk full");
        backend.set_item("a", "1".into()).await.unwrap();
        assert_eq!(backend.calls(Operation::Set), 2);
    }

    #[tokio::test]
    async fn fail_key_targets_one_key() {
        let backend = InMemoryBackend::new();
        backend.fail_key(Operation::Get, "locked", "denied");

        assert!(backend.get_item("locked").await.is_err());
        assert!(backend.get_item("locked").await.is_err());
        assert!(backend.get_item("open").await.unwrap().is_none());

        backend.clear_faults();
        assert!(backend.get_item("locked").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn native_multi_remove_is_one_call() {
        let backend = InMemoryBackend::new();
        for key in ["a", "b", "c"] {
            backend.put_raw(key, "x");
        }
        let keys: Vec<String> = vec!["a".into(), "b".into()];
        backend.multi_remove(&keys).await.unwrap();

        assert_eq!(backend.calls(Operation::MultiRemove), 1);
        assert_eq!(backend.calls(Operation::Remove), 0);
        assert_eq!(backend.get_all_keys().await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn fallback_multi_remove_settles_every_key() {
        let backend = InMemoryBackend::new().with_native_bulk_remove(false);
        for key in ["a", "b", "c"] {
            backend.put_raw(key, "x");
        }
        backend.fail_key(Operation::Remove, "b", "b is busy");
        backend.fail_key(Operation::Remove, "c", "c is busy");

        let keys: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let err = backend.multi_remove(&keys).await.unwrap_err();

        assert_eq!(err.to_string(), "injected failure: b is busy");
        assert_eq!(backend.calls(Operation::Remove), 3);
        assert_eq!(backend.calls(Operation::MultiRemove), 0);
        assert!(backend.raw("a").is_none());
    }

    #[tokio::test]
    async fn clear_removes_all() {
        let backend = InMemoryBackend::new();
        backend.put_raw("a", "1");
        backend.put_raw("b", "2");
        backend.clear().await.unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn debug_format() {
        let backend = InMemoryBackend::new();
        backend.put_raw("x", "1");
        let debug = format!("{backend:?}");
        assert!(debug.contains("InMemoryBackend"));
        assert!(debug.contains("record_count"));
    }
}
