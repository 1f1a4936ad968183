//! Error types for the reference server.

use hivesync_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors the server answers a request with.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Request could not be understood.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A pushed change failed validation.
    #[error("rejected change: {0}")]
    RejectedChange(#[from] ProtocolError),

    /// Idempotency key was seen before and the server is configured to refuse it.
    #[error("duplicate idempotency key: {0}")]
    DuplicateKey(String),
}

impl ServerError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::RejectedChange(_) => 422,
            ServerError::DuplicateKey(_) => 409,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
