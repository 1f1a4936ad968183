//! Request handling.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::oplog::{AppendOutcome, ServerOplog};
use hivesync_sync_protocol::codec;
use hivesync_sync_protocol::{PullRequest, PullResponse, PushAck, PushRequest};
use std::sync::Arc;
use tracing::{debug, info};

/// The reference remote.
///
/// Stores every accepted change in a [`ServerOplog`] and serves them back
/// by cursor. It performs no merging of its own: the newest accepted change
/// for an id is what clients end up with.
///
/// # Example
///
/// ```
/// use hivesync_sync_server::{ServerConfig, SyncServer};
/// use hivesync_sync_protocol::PullRequest;
///
/// let server = SyncServer::new(ServerConfig::default());
/// let response = server.handle_pull(&PullRequest { cursor: "0".into() }).unwrap();
/// assert!(response.changes.is_empty());
/// assert_eq!(response.cursor, "0");
/// ```
pub struct SyncServer {
    config: ServerConfig,
    oplog: Arc<ServerOplog>,
}

impl SyncServer {
    /// Creates a server with an empty log.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_oplog(config, Arc::new(ServerOplog::new()))
    }

    /// Creates a server over an existing log.
    pub fn with_oplog(config: ServerConfig, oplog: Arc<ServerOplog>) -> Self {
        Self { config, oplog }
    }

    /// Handles `POST /sync/push`.
    ///
    /// Every change is validated before any is stored.
    pub fn handle_push(&self, request: &PushRequest) -> ServerResult<PushAck> {
        for change in &request.changes {
            codec::decode_change(change)?;
        }

        match self
            .oplog
            .append(&request.idempotency_key, request.changes.clone())
        {
            AppendOutcome::Appended(accepted) => {
                info!(accepted, cursor = self.oplog.cursor(), "push stored");
                Ok(PushAck {
                    accepted,
                    duplicate: false,
                })
            }
            AppendOutcome::Duplicate if self.config.reject_duplicate_keys => Err(
                ServerError::DuplicateKey(request.idempotency_key.to_string()),
            ),
            AppendOutcome::Duplicate => {
                debug!(key = %request.idempotency_key, "duplicate push acknowledged");
                Ok(PushAck {
                    accepted: 0,
                    duplicate: true,
                })
            }
        }
    }

    /// Handles `GET /sync/pull?cursor=`.
    pub fn handle_pull(&self, request: &PullRequest) -> ServerResult<PullResponse> {
        let cursor: u64 = request
            .cursor
            .parse()
            .map_err(|_| ServerError::InvalidRequest(format!("bad cursor {:?}", request.cursor)))?;
        let (changes, next) = self.oplog.changes_since(cursor, self.config.max_pull_batch);
        debug!(cursor, next, changes = changes.len(), "pull served");
        Ok(PullResponse {
            changes,
            cursor: next.to_string(),
        })
    }

    /// The newest cursor.
    pub fn cursor(&self) -> u64 {
        self.oplog.cursor()
    }

    /// Number of stored changes.
    pub fn change_count(&self) -> usize {
        self.oplog.len()
    }
}
