//! Bridge from a callback-style host key-value store to [`StorageBackend`].
//!
//! Mobile hosts expose their native store through methods that report
//! completion by invoking a callback once. [`NativeBridgeBackend`] hands each
//! call a [`Completion`] wired to a `tokio::sync::oneshot` channel and awaits
//! the other end, turning the callback contract into plain `async` calls.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::{BackendError, BackendResult};
use crate::traits::StorageBackend;

/// Failure reported by the host store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeError(pub String);

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<NativeError> for BackendError {
    fn from(err: NativeError) -> Self {
        BackendError::Native(err.0)
    }
}

/// One-shot completion callback handed to the host.
pub type Completion<T, E = NativeError> = Box<dyn FnOnce(Result<T, E>) + Send + 'static>;

/// Callback-style key-value store provided by a mobile host.
///
/// Every method must eventually invoke its completion exactly once, from any
/// thread. `multi_remove` reports a list of per-key errors.
pub trait NativeKeyValueStore: Send + Sync {
    fn get_item(&self, key: &str, done: Completion<Option<String>>);
    fn set_item(&self, key: &str, value: String, done: Completion<()>);
    fn remove_item(&self, key: &str, done: Completion<()>);
    fn get_all_keys(&self, done: Completion<Vec<String>>);
    fn multi_remove(&self, keys: Vec<String>, done: Completion<(), Vec<NativeError>>);
    fn clear(&self, done: Completion<()>);
}

/// Mobile-class backend over a host [`NativeKeyValueStore`].
#[derive(Clone)]
pub struct NativeBridgeBackend {
    store: Arc<dyn NativeKeyValueStore>,
}

impl NativeBridgeBackend {
    /// Wrap a host store.
    pub fn new(store: Arc<dyn NativeKeyValueStore>) -> Self {
        Self { store }
    }
}

impl fmt::Debug for NativeBridgeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBridgeBackend").finish_non_exhaustive()
    }
}

/// Issue one host call and await its completion.
async fn bridge<T, E>(
    operation: &'static str,
    call: impl FnOnce(Completion<T, E>),
) -> BackendResult<Result<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    call(Box::new(move |result| {
        // The caller may have gone away; nothing to report to.
        let _ = tx.send(result);
    }));
    rx.await.map_err(|_| BackendError::Dropped { operation })
}

#[async_trait]
impl StorageBackend for NativeBridgeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn get_item(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(bridge("getItem", |done| self.store.get_item(key, done)).await??)
    }

    async fn set_item(&self, key: &str, value: String) -> BackendResult<()> {
        Ok(bridge("setItem", |done| self.store.set_item(key, value, done)).await??)
    }

    async fn remove_item(&self, key: &str) -> BackendResult<()> {
        Ok(bridge("removeItem", |done| self.store.remove_item(key, done)).await??)
    }

    async fn get_all_keys(&self) -> BackendResult<Vec<String>> {
        Ok(bridge("getAllKeys", |done| self.store.get_all_keys(done)).await??)
    }

    async fn multi_remove(&self, keys: &[String]) -> BackendResult<()> {
        let keys = keys.to_vec();
        bridge("multiRemove", |done| self.store.multi_remove(keys, done))
            .await?
            .map_err(|errors| match errors.into_iter().next() {
                Some(first) => first.into(),
                None => BackendError::Native("multiRemove failed".into()),
            })
    }

    async fn clear(&self) -> BackendResult<()> {
        Ok(bridge("clear", |done| self.store.clear(done)).await??)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    /// Host double that completes callbacks from a separate thread, the way
    /// a native bridge does.
    #[derive(Default)]
    struct ThreadedHost {
        data: Arc<Mutex<BTreeMap<String, String>>>,
        broken_keys: Vec<String>,
        drop_callbacks: bool,
    }

    impl ThreadedHost {
        fn complete<T: Send + 'static>(&self, done: Completion<T>, result: Result<T, NativeError>) {
            if self.drop_callbacks {
                drop(done);
                return;
            }
            std::thread::spawn(move || done(result));
        }
    }

    impl NativeKeyValueStore for ThreadedHost {
        fn get_item(&self, key: &str, done: Completion<Option<String>>) {
            let value = self.data.lock().unwrap().get(key).cloned();
            self.complete(done, Ok(value));
        }

        fn set_item(&self, key: &str, value: String, done: Completion<()>) {
            if self.broken_keys.iter().any(|k| k == key) {
                self.complete(done, Err(NativeError(format!("cannot write {key}"))));
                return;
            }
            self.data.lock().unwrap().insert(key.to_string(), value);
            self.complete(done, Ok(()));
        }

        fn remove_item(&self, key: &str, done: Completion<()>) {
            self.data.lock().unwrap().remove(key);
            self.complete(done, Ok(()));
        }

        fn get_all_keys(&self, done: Completion<Vec<String>>) {
            let keys = self.data.lock().unwrap().keys().cloned().collect();
            self.complete(done, Ok(keys));
        }

        fn multi_remove(&self, keys: Vec<String>, done: Completion<(), Vec<NativeError>>) {
            let errors: Vec<NativeError> = keys
                .iter()
                .filter(|k| self.broken_keys.contains(*k))
                .map(|k| NativeError(format!("cannot remove {k}")))
                .collect();
            let mut data = self.data.lock().unwrap();
            for key in keys.iter().filter(|k| !self.broken_keys.contains(*k)) {
                data.remove(key);
            }
            let result = if errors.is_empty() { Ok(()) } else { Err(errors) };
            std::thread::spawn(move || done(result));
        }

        fn clear(&self, done: Completion<()>) {
            self.data.lock().unwrap().clear();
            self.complete(done, Ok(()));
        }
    }

    fn backend(host: ThreadedHost) -> NativeBridgeBackend {
        NativeBridgeBackend::new(Arc::new(host))
    }

    #[tokio::test]
    async fn callbacks_resolve_as_async_results() {
        let backend = backend(ThreadedHost::default());
        backend.set_item("k", "v".into()).await.unwrap();
        assert_eq!(backend.get_item("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(backend.get_all_keys().await.unwrap(), vec!["k"]);

        backend.remove_item("k").await.unwrap();
        assert!(backend.get_item("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn host_error_is_surfaced() {
        let backend = backend(ThreadedHost {
            broken_keys: vec!["bad".into()],
            ..Default::default()
        });
        let err = backend.set_item("bad", "v".into()).await.unwrap_err();
        assert!(matches!(err, BackendError::Native(ref m) if m == "cannot write bad"));
    }

    #[tokio::test]
    async fn multi_remove_reports_first_host_error() {
        let host = ThreadedHost {
            broken_keys: vec!["b".into(), "c".into()],
            ..Default::default()
        };
        for key in ["a", "b", "c"] {
            host.data.lock().unwrap().insert(key.into(), "x".into());
        }
        let backend = backend(host);

        let keys: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let err = backend.multi_remove(&keys).await.unwrap_err();
        assert_eq!(err.to_string(), "native store error: cannot remove b");
        assert!(backend.get_item("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dropped_completion_is_an_error() {
        let backend = backend(ThreadedHost {
            drop_callbacks: true,
            ..Default::default()
        });
        let err = backend.get_item("k").await.unwrap_err();
        assert!(matches!(err, BackendError::Dropped { operation: "getItem" }));
    }

    #[tokio::test]
    async fn clear_wipes_host() {
        let backend = backend(ThreadedHost::default());
        backend.set_item("a", "1".into()).await.unwrap();
        backend.clear().await.unwrap();
        assert!(backend.get_all_keys().await.unwrap().is_empty());
    }
}
