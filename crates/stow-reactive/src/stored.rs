use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use stow_store::Storage;
use tokio::sync::watch;

use crate::error::{ReactiveError, ReactiveResult};
use crate::subscription::{subscribe_value, LoadState, ValueSubscription};

/// Latest value of a key, kept current by a [`ValueSubscription`].
///
/// Starts as `null` while loading. Dropping it detaches from the store.
#[derive(Debug)]
pub struct StoredValue {
    value: watch::Receiver<Value>,
    subscription: ValueSubscription,
}

impl StoredValue {
    /// Key being observed.
    pub fn key(&self) -> &str {
        self.subscription.key()
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Current value decoded as `T`; `null` is `None`.
    pub fn get<T: DeserializeOwned>(&self) -> ReactiveResult<Option<T>> {
        Ok(serde_json::from_value(self.value())?)
    }

    /// Returns `true` until the initial read resolves.
    pub fn is_loading(&self) -> bool {
        self.subscription.is_loading()
    }

    pub fn load_state(&self) -> LoadState {
        self.subscription.load_state()
    }

    /// Wait for the initial read to resolve.
    pub async fn wait_loaded(&self) -> LoadState {
        self.subscription.wait_loaded().await
    }

    /// Wait for the next delivered value and return it.
    ///
    /// Values delivered since the last call count as a change, including
    /// the initial read.
    pub async fn changed(&mut self) -> ReactiveResult<Value> {
        self.value.changed().await.map_err(|_| ReactiveError::Closed {
            key: self.subscription.key().to_owned(),
        })?;
        Ok(self.value.borrow_and_update().clone())
    }
}

/// Track `key` in a [`StoredValue`].
///
/// Must be called from within a Tokio runtime.
pub fn use_stored_value(storage: &Arc<Storage>, key: impl Into<String>) -> StoredValue {
    let (tx, rx) = watch::channel(Value::Null);
    let subscription = subscribe_value(storage, key, move |value: &Value| {
        tx.send_replace(value.clone());
    });
    StoredValue {
        value: rx,
        subscription,
    }
}
