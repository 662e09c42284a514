use std::path::Path;

use serde::{Deserialize, Serialize};
use stow_backend::BackendConfig;

/// Errors loading a [`StorageConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Storage engine configuration.
///
/// ```toml
/// debug = false
/// notify_on_remove = false
/// ordered_writes = false
///
/// [backend]
/// platform = "desktop"
/// data_dir = ".stow"
/// test_mode = false
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Surface raw backend errors instead of the fixed messages.
    pub debug: bool,
    /// Broadcast `null` to listeners of keys that are removed or cleared.
    /// Off by default: only confirmed writes notify.
    pub notify_on_remove: bool,
    /// Serialize concurrent `set` calls on the same key so listeners see
    /// writes in call order. Off by default: callers serialize themselves.
    pub ordered_writes: bool,
    /// Backend selection.
    pub backend: BackendConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            debug: cfg!(debug_assertions),
            notify_on_remove: false,
            ordered_writes: false,
            backend: BackendConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
