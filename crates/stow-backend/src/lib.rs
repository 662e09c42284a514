//! Platform key-value backends for the stow store.
//!
//! The storage engine never talks to a concrete platform store directly.
//! It holds one [`StorageBackend`], picked once per process by the
//! [`BackendSelector`] from the [`Platform`] classification.
//!
//! # Backends
//!
//! - [`FileBackend`] -- desktop-class persistent object store, one file per
//!   key under a data directory. Has no native bulk removal.
//! - [`NativeBridgeBackend`] -- mobile-class store that adapts a host
//!   [`NativeKeyValueStore`] reporting completion through callbacks.
//! - [`InMemoryBackend`] -- deterministic substitute used in tests in place
//!   of the native bridge.
//!
//! # Design Rules
//!
//! 1. Records are opaque strings; backends never interpret them.
//! 2. A missing record is `Ok(None)`, never an error.
//! 3. Selection happens once. There is no fallback from one platform's
//!    backend to the other's.
//! 4. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod native;
pub mod platform;
pub mod selector;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use file::FileBackend;
pub use memory::{InMemoryBackend, Operation};
pub use native::{Completion, NativeBridgeBackend, NativeError, NativeKeyValueStore};
pub use platform::Platform;
pub use selector::{BackendConfig, BackendSelector};
pub use traits::StorageBackend;
