//! Per-key change listeners.
//!
//! [`ListenerRegistry`] maps each storage key to the callbacks subscribed to
//! it. Identities come from a monotonically increasing counter, so removing
//! one registration can never disturb another. A key whose last listener is
//! removed disappears from the map entirely.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

/// Callback invoked with the confirmed value of a key.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identity of one listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

struct RegistryInner {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<String, HashMap<ListenerId, Listener>>>,
}

/// Registry of listeners keyed by storage key.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(1),
                listeners: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register `listener` under `key`.
    pub fn subscribe<F>(&self, key: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let key = key.into();
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .expect("registry lock poisoned")
            .entry(key.clone())
            .or_default()
            .insert(id, Arc::new(listener));
        debug!(%key, %id, "listener added");
        Subscription {
            key,
            id,
            registry: self.clone(),
        }
    }

    /// Remove one registration. Returns `true` if it was present.
    pub fn unsubscribe(&self, key: &str, id: ListenerId) -> bool {
        let mut map = self.inner.listeners.write().expect("registry lock poisoned");
        let Some(entries) = map.get_mut(key) else {
            return false;
        };
        let removed = entries.remove(&id).is_some();
        if entries.is_empty() {
            map.remove(key);
        }
        removed
    }

    /// Remove every listener under `key`. Returns how many were removed.
    pub fn unsubscribe_all(&self, key: &str) -> usize {
        self.inner
            .listeners
            .write()
            .expect("registry lock poisoned")
            .remove(key)
            .map_or(0, |entries| entries.len())
    }

    /// Invoke every listener under `key` with `value`.
    ///
    /// Invocation order is unspecified. Listeners run outside the registry
    /// lock, so they may subscribe or unsubscribe freely. A listener removed
    /// while the broadcast is in progress is not called afterwards; one added
    /// meanwhile is not called at all. A panicking listener is logged and
    /// skipped. Returns how many listeners ran to completion.
    pub fn broadcast(&self, key: &str, value: &Value) -> usize {
        let snapshot: Vec<(ListenerId, Listener)> = {
            let map = self.inner.listeners.read().expect("registry lock poisoned");
            match map.get(key) {
                Some(entries) => entries
                    .iter()
                    .map(|(id, listener)| (*id, Arc::clone(listener)))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (id, listener) in snapshot {
            if !self.contains(key, id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener(value))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(%key, %id, "listener panicked during broadcast"),
            }
        }
        delivered
    }

    fn contains(&self, key: &str, id: ListenerId) -> bool {
        self.inner
            .listeners
            .read()
            .expect("registry lock poisoned")
            .get(key)
            .is_some_and(|entries| entries.contains_key(&id))
    }

    /// Number of listeners registered under `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.inner
            .listeners
            .read()
            .expect("registry lock poisoned")
            .get(key)
            .map_or(0, HashMap::len)
    }

    /// Keys that currently have at least one listener.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .listeners
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Returns `true` if no listeners are registered at all.
    pub fn is_empty(&self) -> bool {
        self.inner
            .listeners
            .read()
            .expect("registry lock poisoned")
            .is_empty()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Handle to one listener registration.
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it. Unsubscribing is idempotent.
#[must_use = "dropping a Subscription keeps the listener registered with no way to remove it"]
pub struct Subscription {
    key: String,
    id: ListenerId,
    registry: ListenerRegistry,
}

impl Subscription {
    /// Key this listener is registered under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Identity of this registration.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if self.registry.unsubscribe(&self.key, self.id) {
            debug!(key = %self.key, id = %self.id, "listener removed");
        }
    }

    /// Returns `true` while the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.registry.contains(&self.key, self.id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
