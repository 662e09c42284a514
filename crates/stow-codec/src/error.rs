/// Errors from envelope encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value could not be turned into envelope text.
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The raw text is not a well-formed envelope (data corruption).
    #[error("deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
