use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The document changed since it was read; the write was not applied.
    #[error("write conflict on {document}: {message}")]
    Conflict { document: String, message: String },
    /// A stored document could not be decoded into the domain model.
    #[error("corrupted document {document}: {message}")]
    Corrupted { document: String, message: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    pub fn conflict(document: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Conflict {
            document: document.into(),
            message: message.into(),
        }
    }

    pub fn corrupted(document: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Corrupted {
            document: document.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the whole read-modify-write may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable { .. } | StorageError::Conflict { .. }
        )
    }
}
