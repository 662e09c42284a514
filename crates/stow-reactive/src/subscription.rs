use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use stow_store::{Storage, Subscription};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Progress of the initial read behind a [`ValueSubscription`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// The initial read has not resolved yet.
    Loading,
    /// The initial read resolved. Its value was delivered unless a
    /// confirmed write reached the callback first.
    Ready,
    /// The initial read failed with this message. The callback was not
    /// invoked; later writes are still delivered.
    Failed(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// Handle returned by [`subscribe_value`].
///
/// Dropping the handle detaches the callback. Detaching happens once no
/// matter how many times [`unsubscribe`](Self::unsubscribe) is called.
#[must_use = "dropping a ValueSubscription detaches its callback immediately"]
pub struct ValueSubscription {
    key: String,
    subscription: Subscription,
    active: Arc<AtomicBool>,
    state: watch::Receiver<LoadState>,
}

impl ValueSubscription {
    /// Key being observed.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` until the initial read resolves.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Current state of the initial read.
    pub fn load_state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// Wait for the initial read to resolve and return its outcome.
    pub async fn wait_loaded(&self) -> LoadState {
        let mut state = self.state.clone();
        if state.wait_for(|s| !s.is_loading()).await.is_err() {
            debug!(key = %self.key, "loader ended without reporting");
        }
        let resolved = state.borrow().clone();
        resolved
    }

    /// Returns `true` while the callback is still attached.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Detach the callback. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.subscription.unsubscribe();
            debug!(key = %self.key, "value subscription ended");
        }
    }
}

impl Drop for ValueSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for ValueSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSubscription")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Observe `key`: deliver its current value once, then every confirmed write.
///
/// The callback is registered before the initial read starts, so no write
/// that lands during loading is missed. If such a write reaches the callback
/// before the initial read resolves, the initial value is dropped rather
/// than delivered after the newer one. A panic in the callback during the
/// initial delivery is logged and loading still completes.
///
/// The initial read runs on a spawned Tokio task; this must be called from
/// within a Tokio runtime.
pub fn subscribe_value<F>(storage: &Arc<Storage>, key: impl Into<String>, callback: F) -> ValueSubscription
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    let key = key.into();
    let callback = Arc::new(callback);
    let active = Arc::new(AtomicBool::new(true));
    let (state_tx, state_rx) = watch::channel(LoadState::Loading);

    // Set once a broadcast has been delivered; deliveries hold the lock.
    let broadcast_seen = Arc::new(Mutex::new(false));

    let subscription = {
        let callback = Arc::clone(&callback);
        let active = Arc::clone(&active);
        let broadcast_seen = Arc::clone(&broadcast_seen);
        storage.add_listener(key.clone(), move |value: &Value| {
            if active.load(Ordering::Acquire) {
                let mut seen = broadcast_seen.lock().unwrap_or_else(PoisonError::into_inner);
                *seen = true;
                callback(value);
            }
        })
    };

    let storage = Arc::clone(storage);
    let task_key = key.clone();
    let task_active = Arc::clone(&active);
    tokio::spawn(async move {
        let state = match storage.get_value(&task_key).await {
            Ok(value) if task_active.load(Ordering::Acquire) => {
                let seen = broadcast_seen.lock().unwrap_or_else(PoisonError::into_inner);
                if *seen {
                    debug!(key = %task_key, "initial value superseded by a confirmed write");
                } else if catch_unwind(AssertUnwindSafe(|| callback(&value))).is_err() {
                    warn!(key = %task_key, "callback panicked on initial value");
                }
                LoadState::Ready
            }
            Ok(_) => {
                debug!(key = %task_key, "initial value discarded after unsubscribe");
                LoadState::Ready
            }
            Err(err) => {
                debug!(key = %task_key, error = %err, "initial read failed");
                LoadState::Failed(err.to_string())
            }
        };
        state_tx.send_replace(state);
    });

    debug!(key = %key, "value subscription started");
    ValueSubscription {
        key,
        subscription,
        active,
        state: state_rx,
    }
}
