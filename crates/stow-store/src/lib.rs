//! Unified asynchronous key-value storage.
//!
//! [`Storage`] gives application code one API over whichever backend the
//! platform provides: a file store on desktop, the host's native store on
//! mobile, or an in-memory store under test. Values are persisted as JSON
//! envelopes (see [`stow_codec`]) and every successful write is confirmed by
//! a read-back before it is broadcast to the key's listeners.
//!
//! # Operations
//!
//! - [`Storage::get`] / [`Storage::get_value`] -- read a key; absent is `None`/`null`
//! - [`Storage::set`] / [`Storage::set_value`] -- write, verify, broadcast
//! - [`Storage::remove_item`] / [`Storage::remove_items`] / [`Storage::clear`]
//! - [`Storage::get_keys`] -- list present keys
//! - [`Storage::add_listener`] / [`Storage::remove_all_listeners`]
//!
//! # Errors
//!
//! Every failure is funneled through [`ErrorPolicy`]. In debug configuration
//! the raw backend error is surfaced; otherwise callers see one of five fixed
//! messages selected by [`ErrorKind`].

pub mod config;
pub mod error;
mod locks;
pub mod registry;
pub mod storage;

pub use config::{ConfigError, StorageConfig};
pub use error::{Cause, ErrorKind, ErrorPolicy, StorageError, StorageResult};
pub use registry::{Listener, ListenerId, ListenerRegistry, Subscription};
pub use storage::Storage;

pub use stow_backend;
pub use stow_codec;
