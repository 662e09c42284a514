use async_trait::async_trait;

use crate::error::BackendResult;

/// Asynchronous key-value capability set every platform backend provides.
///
/// All implementations must satisfy these invariants:
/// - Values are opaque strings, stored and returned byte-for-byte.
/// - `get_item` on a missing key returns `Ok(None)`.
/// - `remove_item` on a missing key succeeds.
/// - Key order from `get_all_keys` is backend-defined.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Read the raw record stored under `key`.
    async fn get_item(&self, key: &str) -> BackendResult<Option<String>>;

    /// Create or replace the raw record stored under `key`.
    async fn set_item(&self, key: &str, value: String) -> BackendResult<()>;

    /// Delete the record stored under `key`.
    async fn remove_item(&self, key: &str) -> BackendResult<()>;

    /// List every key currently present.
    async fn get_all_keys(&self) -> BackendResult<Vec<String>>;

    /// Remove several keys.
    ///
    /// Default implementation issues one `remove_item()` per key, waits for
    /// every removal to settle, and reports the first error encountered.
    /// Backends with a native bulk primitive override it.
    async fn multi_remove(&self, keys: &[String]) -> BackendResult<()> {
        remove_each(self, keys).await
    }

    /// Remove every record.
    async fn clear(&self) -> BackendResult<()>;
}

/// Remove `keys` one at a time through `remove_item()`.
///
/// Every removal is attempted even after a failure; the first error wins.
pub async fn remove_each<B>(backend: &B, keys: &[String]) -> BackendResult<()>
where
    B: StorageBackend + ?Sized,
{
    let mut first_error = None;
    for key in keys {
        if let Err(err) = backend.remove_item(key).await {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
