use tracing::warn;

/// Boxed underlying failure carried by a [`StorageError`] in debug builds.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Category of a failed storage operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The value could not be encoded.
    Serialization,
    /// Stored bytes could not be decoded (data corruption).
    Deserialization,
    /// The backend rejected a write.
    Set,
    /// The backend rejected a read or key listing.
    Get,
    /// The backend rejected a removal or clear.
    Delete,
}

impl ErrorKind {
    /// Fixed, user-facing message surfaced outside debug configuration.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::Serialization => {
                "Storage Error: Failed to persist data due to possible data corruption"
            }
            ErrorKind::Deserialization => "Storage Error: Failed due to corruption in persisted data",
            ErrorKind::Set => "Storage Error: Failed to persist data",
            ErrorKind::Get => "Storage Error: Failed to retrieve persisted data",
            ErrorKind::Delete => "Storage Error: Failed to delete from local storage",
        }
    }
}

/// Errors surfaced by [`Storage`](crate::Storage) operations.
///
/// Every variant carries the message the caller sees. The underlying cause
/// is attached only when the store runs in debug configuration.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{message}")]
    Serialization {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    #[error("{message}")]
    Deserialization {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    #[error("{message}")]
    Set {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    #[error("{message}")]
    Get {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    #[error("{message}")]
    Delete {
        message: String,
        #[source]
        cause: Option<Cause>,
    },
}

impl StorageError {
    fn from_parts(kind: ErrorKind, message: String, cause: Option<Cause>) -> Self {
        match kind {
            ErrorKind::Serialization => StorageError::Serialization { message, cause },
            ErrorKind::Deserialization => StorageError::Deserialization { message, cause },
            ErrorKind::Set => StorageError::Set { message, cause },
            ErrorKind::Get => StorageError::Get { message, cause },
            ErrorKind::Delete => StorageError::Delete { message, cause },
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Serialization { .. } => ErrorKind::Serialization,
            StorageError::Deserialization { .. } => ErrorKind::Deserialization,
            StorageError::Set { .. } => ErrorKind::Set,
            StorageError::Get { .. } => ErrorKind::Get,
            StorageError::Delete { .. } => ErrorKind::Delete,
        }
    }

    /// The message surfaced to the caller.
    pub fn message(&self) -> &str {
        match self {
            StorageError::Serialization { message, .. }
            | StorageError::Deserialization { message, .. }
            | StorageError::Set { message, .. }
            | StorageError::Get { message, .. }
            | StorageError::Delete { message, .. } => message,
        }
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The single funnel every storage failure passes through.
///
/// In debug configuration the underlying error text is surfaced verbatim and
/// kept as the error source. Otherwise the fixed message for the category
/// replaces it so backend diagnostics never reach end users. The raw cause
/// is logged either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorPolicy {
    debug: bool,
}

impl ErrorPolicy {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Whether raw causes are surfaced.
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Turn a raw failure into the error the caller receives.
    pub fn resolve(&self, kind: ErrorKind, cause: impl Into<Cause>) -> StorageError {
        let cause = cause.into();
        warn!(?kind, error = %cause, "storage operation failed");
        if self.debug {
            StorageError::from_parts(kind, cause.to_string(), Some(cause))
        } else {
            StorageError::from_parts(kind, kind.message().to_string(), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    fn raw() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "EACCES: /data/db")
    }

    #[test]
    fn release_policy_sanitizes() {
        let err = ErrorPolicy::new(false).resolve(ErrorKind::Set, raw());
        assert_eq!(err.to_string(), "Storage Error: Failed to persist data");
        assert_eq!(err.kind(), ErrorKind::Set);
        assert!(err.source().is_none());
    }

    #[test]
    fn debug_policy_surfaces_cause() {
        let err = ErrorPolicy::new(true).resolve(ErrorKind::Get, raw());
        assert_eq!(err.to_string(), "EACCES: /data/db");
        assert_eq!(err.kind(), ErrorKind::Get);
        assert_eq!(err.source().unwrap().to_string(), "EACCES: /data/db");
    }

    #[test]
    fn every_kind_has_its_own_message() {
        let kinds = [
            ErrorKind::Serialization,
            ErrorKind::Deserialization,
            ErrorKind::Set,
            ErrorKind::Get,
            ErrorKind::Delete,
        ];
        let policy = ErrorPolicy::new(false);
        for kind in kinds {
            let err = policy.resolve(kind, "boom");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), kind.message());
        }
        let messages: std::collections::HashSet<_> = kinds.iter().map(|k| k.message()).collect();
        assert_eq!(messages.len(), kinds.len());
    }
}
