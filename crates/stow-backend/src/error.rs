use std::path::PathBuf;

/// Errors reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host store reported a failure.
    #[error("native store error: {0}")]
    Native(String),

    /// The host store dropped its completion callback without invoking it.
    #[error("native store dropped the completion for {operation}")]
    Dropped { operation: &'static str },

    /// No backend can serve the selected platform.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// A stored record is not valid UTF-8 or a key could not be mapped.
    #[error("invalid record at {path}: {reason}")]
    InvalidRecord { path: PathBuf, reason: String },

    /// A failure injected by the in-memory test backend.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
