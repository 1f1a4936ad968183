//! Error types for the local store.

use crate::entity::EntityId;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] hivesync_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Journal record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Journal contents failed validation.
    #[error("journal corrupted at offset {offset}: {message}")]
    JournalCorrupted {
        /// Offset of the offending record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// No entity with this id exists.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Local persistence is not available on this device.
    #[error("local store unavailable: {reason}")]
    Unavailable {
        /// Why the store could not be opened.
        reason: String,
    },

    /// The store was used after `close()`.
    #[error("local store is closed")]
    StoreClosed,

    /// Caller passed an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::JournalCorrupted {
            offset,
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::corrupted(42, "checksum mismatch");
        assert_eq!(
            err.to_string(),
            "journal corrupted at offset 42: checksum mismatch"
        );

        let err = CoreError::unavailable("read-only filesystem");
        assert!(err.to_string().contains("read-only filesystem"));
    }

    #[test]
    fn storage_errors_convert() {
        let storage = hivesync_storage::StorageError::ReadPastEnd {
            offset: 1,
            len: 2,
            size: 0,
        };
        let err: CoreError = storage.into();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
