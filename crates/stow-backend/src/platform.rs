use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Class of environment the process runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Desktop or browser-class host with a persistent object store.
    Desktop,
    /// Mobile host exposing a native key-value store.
    Mobile,
}

static CURRENT: OnceLock<Platform> = OnceLock::new();

impl Platform {
    /// Classify the compile target. Android and iOS are mobile-class.
    pub fn detect() -> Self {
        if cfg!(any(target_os = "android", target_os = "ios")) {
            Platform::Mobile
        } else {
            Platform::Desktop
        }
    }

    /// The classification for this process, computed on first use.
    pub fn current() -> Self {
        *CURRENT.get_or_init(Self::detect)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Desktop => f.write_str("desktop"),
            Platform::Mobile => f.write_str("mobile"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_stable() {
        assert_eq!(Platform::current(), Platform::current());
        assert_eq!(Platform::current(), Platform::detect());
    }

    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    #[test]
    fn host_tests_run_on_desktop() {
        assert_eq!(Platform::detect(), Platform::Desktop);
    }

    #[test]
    fn display_and_serde_agree() {
        for platform in [Platform::Desktop, Platform::Mobile] {
            let json = serde_json::to_string(&platform).unwrap();
            assert_eq!(json, format!("\"{platform}\""));
        }
    }
}
