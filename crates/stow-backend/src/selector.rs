use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BackendError, BackendResult};
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use crate::native::{NativeBridgeBackend, NativeKeyValueStore};
use crate::platform::Platform;
use crate::traits::StorageBackend;

/// Backend selection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Force a platform instead of detecting it.
    pub platform: Option<Platform>,
    /// Root directory of the desktop-class file store.
    pub data_dir: PathBuf,
    /// Substitute the in-memory backend for the mobile native store.
    pub test_mode: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            platform: None,
            data_dir: PathBuf::from(".stow"),
            test_mode: false,
        }
    }
}

impl BackendConfig {
    /// Platform this configuration resolves to.
    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }
}

/// Picks the single backend a process uses.
///
/// - Desktop: [`FileBackend`] rooted at `data_dir`.
/// - Mobile: [`NativeBridgeBackend`] over the registered host store, or
///   [`InMemoryBackend`] when `test_mode` is set.
///
/// Selection never falls back across platforms: a mobile process without a
/// host store fails with [`BackendError::Unavailable`].
#[derive(Clone, Default)]
pub struct BackendSelector {
    native: Option<Arc<dyn NativeKeyValueStore>>,
}

impl BackendSelector {
    /// Selector with no host store registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the host store used on mobile platforms.
    pub fn with_native_store(mut self, store: Arc<dyn NativeKeyValueStore>) -> Self {
        self.native = Some(store);
        self
    }

    /// Build the backend for `config`.
    pub fn select(&self, config: &BackendConfig) -> BackendResult<Arc<dyn StorageBackend>> {
        let platform = config.platform();
        let backend: Arc<dyn StorageBackend> = match platform {
            Platform::Desktop => Arc::new(FileBackend::open(&config.data_dir)?),
            Platform::Mobile if config.test_mode => Arc::new(InMemoryBackend::new()),
            Platform::Mobile => match &self.native {
                Some(store) => Arc::new(NativeBridgeBackend::new(Arc::clone(store))),
                None => {
                    return Err(BackendError::Unavailable(
                        "no native key-value store registered for mobile platform".into(),
                    ))
                }
            },
        };
        info!(%platform, backend = backend.name(), "storage backend selected");
        Ok(backend)
    }
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("has_native_store", &self.native.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{Completion, NativeError};

    struct NullHost;

    impl NativeKeyValueStore for NullHost {
        fn get_item(&self, _key: &str, done: Completion<Option<String>>) {
            done(Ok(None));
        }
        fn set_item(&self, _key: &str, _value: String, done: Completion<()>) {
            done(Ok(()));
        }
        fn remove_item(&self, _key: &str, done: Completion<()>) {
            done(Ok(()));
        }
        fn get_all_keys(&self, done: Completion<Vec<String>>) {
            done(Ok(Vec::new()));
        }
        fn multi_remove(&self, _keys: Vec<String>, done: Completion<(), Vec<NativeError>>) {
            done(Ok(()));
        }
        fn clear(&self, done: Completion<()>) {
            done(Ok(()));
        }
    }

    #[test]
    fn desktop_selects_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = BackendConfig {
            platform: Some(Platform::Desktop),
            data_dir: dir.path().join("data"),
            test_mode: false,
        };
        let backend = BackendSelector::new().select(&config).unwrap();
        assert_eq!(backend.name(), "file");
        assert!(dir.path().join("data").is_dir());
    }

    #[test]
    fn mobile_test_mode_selects_memory() {
        let config = BackendConfig {
            platform: Some(Platform::Mobile),
            test_mode: true,
            ..Default::default()
        };
        let backend = BackendSelector::new().select(&config).unwrap();
        assert_eq!(backend.name(), "memory");
    }

    #[test]
    fn mobile_uses_registered_host() {
        let config = BackendConfig {
            platform: Some(Platform::Mobile),
            ..Default::default()
        };
        let selector = BackendSelector::new().with_native_store(Arc::new(NullHost));
        assert_eq!(selector.select(&config).unwrap().name(), "native");
    }

    #[test]
    fn mobile_without_host_does_not_fall_back() {
        let config = BackendConfig {
            platform: Some(Platform::Mobile),
            ..Default::default()
        };
        let err = BackendSelector::new().select(&config).err().unwrap();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    #[test]
    fn config_defaults_to_detected_platform() {
        assert_eq!(BackendConfig::default().platform(), Platform::current());
    }
}
