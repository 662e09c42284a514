//! Reactive views over a [`Storage`](stow_store::Storage) key.
//!
//! A UI component typically wants two things from a key: its current value
//! right away, and every confirmed change after that. This crate sequences
//! the store's read and listener calls to provide both:
//!
//! - [`subscribe_value`] registers a callback, performs one initial read and
//!   tracks whether that read is still outstanding.
//! - [`use_stored_value`] keeps the latest value in a watch channel so a
//!   consumer can poll it or await changes.
//!
//! Both detach their listener exactly once when the handle is dropped, even
//! if that happens before the initial read completes. Neither aborts an
//! in-flight backend call; a late result is simply discarded.

pub mod error;
pub mod stored;
pub mod subscription;

pub use error::{ReactiveError, ReactiveResult};
pub use stored::{use_stored_value, StoredValue};
pub use subscription::{subscribe_value, LoadState, ValueSubscription};
