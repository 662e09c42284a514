//! Envelope codec for the stow key-value store.
//!
//! Every record persisted by stow is a JSON document of the form
//! `{"value": <original>}`. Wrapping the value in an object means that
//! `null`, scalars, strings, arrays and objects all travel through the same
//! decode path, and a stored `null` can never be confused with a record that
//! is missing altogether.
//!
//! # Contract
//!
//! - `decode(encode(v)) == v` for every serializable `v`, including `null`.
//! - [`encode`] fails with [`CodecError::Serialization`] when the value
//!   cannot be represented (for example a map with non-string keys).
//! - [`decode`] fails with [`CodecError::Deserialization`] when the raw text
//!   is not a well-formed envelope.
//! - An absent record is not the codec's business: callers special-case
//!   "not found" before decoding.

pub mod envelope;
pub mod error;

pub use envelope::{decode, decode_value, encode, StoredEnvelope};
pub use error::{CodecError, CodecResult};
