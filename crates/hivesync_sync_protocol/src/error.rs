//! Error types for the sync protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding remote data.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A change names an entity type this client does not know.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    /// A change could not be turned into a local entity.
    #[error("malformed {entity} change {id}: {reason}")]
    MalformedChange {
        /// Wire entity name.
        entity: String,
        /// Id as sent by the remote.
        id: String,
        /// What was wrong.
        reason: String,
    },

    /// Body was not valid JSON for the expected message.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates a malformed change error.
    pub fn malformed(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedChange {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }
}
