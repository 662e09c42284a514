use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use stow_backend::{BackendError, BackendSelector, StorageBackend};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::{ErrorKind, ErrorPolicy, StorageResult};
use crate::locks::KeyLocks;
use crate::registry::{ListenerRegistry, Subscription};

/// Unified asynchronous key-value store.
///
/// Each operation either resolves with its value or rejects with a
/// [`StorageError`](crate::StorageError) that has been through the
/// [`ErrorPolicy`]. Failures are scoped to the call that hit them; the
/// listener registry and later calls are unaffected.
///
/// Writes are verified: after `set` writes a record it reads the key back,
/// broadcasts that confirmed value to the key's listeners, and only then
/// resolves. Listeners therefore never see a value that failed to persist.
///
/// Concurrent `set` calls on one key are unordered unless
/// [`StorageConfig::ordered_writes`] is enabled.
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    listeners: ListenerRegistry,
    policy: ErrorPolicy,
    config: StorageConfig,
    write_locks: KeyLocks,
}

impl Storage {
    /// Build a store over an explicit backend with a fresh listener registry.
    pub fn new(backend: Arc<dyn StorageBackend>, config: StorageConfig) -> Self {
        Self::with_registry(backend, config, ListenerRegistry::new())
    }

    /// Build a store that broadcasts through an existing registry.
    pub fn with_registry(
        backend: Arc<dyn StorageBackend>,
        config: StorageConfig,
        listeners: ListenerRegistry,
    ) -> Self {
        Self {
            backend,
            listeners,
            policy: ErrorPolicy::new(config.debug),
            config,
            write_locks: KeyLocks::default(),
        }
    }

    /// Select the platform backend once and build the store over it.
    pub fn open(config: StorageConfig, selector: &BackendSelector) -> Result<Self, BackendError> {
        let backend = selector.select(&config.backend)?;
        info!(
            backend = backend.name(),
            debug = config.debug,
            notify_on_remove = config.notify_on_remove,
            ordered_writes = config.ordered_writes,
            "storage opened"
        );
        Ok(Self::new(backend, config))
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Active configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The registry this store broadcasts through.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    // ---- Reads ----

    /// Read `key` as JSON. A missing record is `Value::Null`.
    pub async fn get_value(&self, key: &str) -> StorageResult<Value> {
        let raw = self
            .backend
            .get_item(key)
            .await
            .map_err(|e| self.policy.resolve(ErrorKind::Get, e))?;

        let value = match raw.as_deref() {
            None | Some("") => Value::Null,
            Some(raw) => stow_codec::decode_value(raw)
                .map_err(|e| self.policy.resolve(ErrorKind::Deserialization, e))?,
        };
        debug!(key, backend = self.backend.name(), found = raw.is_some(), "get");
        Ok(value)
    }

    /// Read `key` as `T`. Both a missing record and a stored `null` are
    /// `None`; a record that does not decode as `T` is a deserialization
    /// error.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let value = self.get_value(key).await?;
        self.from_value(value)
    }

    /// Every key currently present. Order is backend-defined.
    pub async fn get_keys(&self) -> StorageResult<Vec<String>> {
        let keys = self
            .backend
            .get_all_keys()
            .await
            .map_err(|e| self.policy.resolve(ErrorKind::Get, e))?;
        debug!(count = keys.len(), "get_keys");
        Ok(keys)
    }

    // ---- Writes ----

    /// Store `value` under `key` and resolve with the verified stored value.
    ///
    /// Resolves `None` only if the record vanished between the write and
    /// the verification read.
    pub async fn set<T>(&self, key: &str, value: &T) -> StorageResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let verified = self.write_verified(key, value).await?;
        self.from_value(verified)
    }

    /// Store a JSON value and resolve with the verified stored value.
    pub async fn set_value(&self, key: &str, value: &Value) -> StorageResult<Value> {
        self.write_verified(key, value).await
    }

    async fn write_verified<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<Value> {
        // Encoding failures surface before any backend I/O.
        let raw = stow_codec::encode(value)
            .map_err(|e| self.policy.resolve(ErrorKind::Serialization, e))?;

        let _guard = if self.config.ordered_writes {
            Some(self.write_locks.acquire(key).await)
        } else {
            None
        };

        self.backend
            .set_item(key, raw)
            .await
            .map_err(|e| self.policy.resolve(ErrorKind::Set, e))?;

        let verified = self.get_value(key).await?;
        let notified = self.listeners.broadcast(key, &verified);
        debug!(key, backend = self.backend.name(), notified, "set");
        Ok(verified)
    }

    // ---- Removal ----

    /// Delete the record under `key`.
    pub async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.backend
            .remove_item(key)
            .await
            .map_err(|e| self.policy.resolve(ErrorKind::Delete, e))?;
        debug!(key, "remove_item");
        if self.config.notify_on_remove {
            self.listeners.broadcast(key, &Value::Null);
        }
        Ok(())
    }

    /// Delete several records. Resolves once every removal has settled and
    /// rejects with the first removal error encountered.
    pub async fn remove_items<K: AsRef<str>>(&self, keys: &[K]) -> StorageResult<()> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_owned()).collect();
        self.backend
            .multi_remove(&keys)
            .await
            .map_err(|e| self.policy.resolve(ErrorKind::Delete, e))?;
        debug!(count = keys.len(), "remove_items");
        if self.config.notify_on_remove {
            for key in &keys {
                self.listeners.broadcast(key, &Value::Null);
            }
        }
        Ok(())
    }

    /// Delete every record.
    pub async fn clear(&self) -> StorageResult<()> {
        self.backend
            .clear()
            .await
            .map_err(|e| self.policy.resolve(ErrorKind::Delete, e))?;
        debug!(backend = self.backend.name(), "clear");
        if self.config.notify_on_remove {
            for key in self.listeners.keys() {
                self.listeners.broadcast(&key, &Value::Null);
            }
        }
        Ok(())
    }

    // ---- Listeners ----

    /// Call `listener` with the confirmed value every time `key` is written.
    pub fn add_listener<F>(&self, key: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listeners.subscribe(key, listener)
    }

    /// Drop every listener registered under `key`.
    pub fn remove_all_listeners(&self, key: &str) {
        let removed = self.listeners.unsubscribe_all(key);
        debug!(key, removed, "listeners cleared");
    }

    fn from_value<T: DeserializeOwned>(&self, value: Value) -> StorageResult<Option<T>> {
        serde_json::from_value(value).map_err(|e| self.policy.resolve(ErrorKind::Deserialization, e))
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("backend", &self.backend.name())
            .field("listeners", &self.listeners)
            .field("config", &self.config)
            .finish()
    }
}
