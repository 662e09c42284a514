/// Errors from reactive views.
#[derive(Debug, thiserror::Error)]
pub enum ReactiveError {
    #[error("stored value does not match the requested type: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("subscription to '{key}' has ended")]
    Closed { key: String },
}

/// Result alias for reactive operations.
pub type ReactiveResult<T> = Result<T, ReactiveError>;
