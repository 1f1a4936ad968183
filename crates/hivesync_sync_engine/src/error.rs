//! Error types for the sync engine.

use hivesync_core::CoreError;
use hivesync_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote answered with a non-2xx status.
    #[error("remote returned status {status}")]
    RemoteStatus {
        /// HTTP status code.
        status: u16,
    },

    /// A network call did not finish within the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// A cycle is already in progress.
    #[error("a sync cycle is already running")]
    AlreadyRunning,

    /// A pulled change could not be decoded. Nothing from the batch was applied.
    #[error("malformed remote change: {0}")]
    MalformedChange(#[from] ProtocolError),

    /// Local store failure.
    #[error("local store error: {0}")]
    Local(#[from] CoreError),

    /// No session is active.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Response body could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Retrying was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout | SyncError::RemoteStatus { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the remote rejected our credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SyncError::NotAuthenticated | SyncError::RemoteStatus { status: 401 | 403 }
        )
    }
}
