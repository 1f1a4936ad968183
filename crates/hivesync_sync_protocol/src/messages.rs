//! Request and response bodies.

use hivesync_core::{Operation, SyncCursor};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One change travelling in either direction.
///
/// `entity` and `timestamp` stay as raw strings here so that a single bad
/// change surfaces as a malformed-change error from [`crate::codec`] rather
/// than failing to parse the whole body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChange {
    /// Wire name of the entity kind.
    pub entity: String,
    /// Entity id.
    pub id: String,
    /// Operation.
    pub operation: Operation,
    /// Entity payload. Absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// ISO-8601 time of the change.
    pub timestamp: String,
}

/// Key that lets the remote recognise a retried push.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generates a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdempotencyKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `POST /sync/push`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// One change per entity, in first-mutation order.
    pub changes: Vec<WireChange>,
    /// Fresh per batch.
    pub idempotency_key: IdempotencyKey,
}

impl PushRequest {
    /// Creates a request with a fresh idempotency key.
    #[must_use]
    pub fn new(changes: Vec<WireChange>) -> Self {
        Self {
            changes,
            idempotency_key: IdempotencyKey::generate(),
        }
    }
}

/// Success body of a push. Clients do not depend on its contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAck {
    /// Changes the remote appended to its log.
    pub accepted: usize,
    /// True if the key had been seen before and nothing was applied.
    pub duplicate: bool,
}

/// Query of `GET /sync/pull`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Cursor from the last applied pull, or `"0"`.
    pub cursor: String,
}

impl PullRequest {
    /// Builds the request for a persisted cursor.
    #[must_use]
    pub fn from_cursor(cursor: &SyncCursor) -> Self {
        Self {
            cursor: cursor.position().to_string(),
        }
    }
}

/// Body of a pull response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Remote changes in stream order.
    pub changes: Vec<WireChange>,
    /// Cursor to send next time.
    pub cursor: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_body_uses_camel_case_key() {
        let request = PushRequest {
            changes: vec![WireChange {
                entity: "volk".into(),
                id: "8a3c6e2e-1111-4e5b-9c1d-000000000001".into(),
                operation: Operation::Delete,
                data: None,
                timestamp: "2024-05-01T10:00:00.000Z".into(),
            }],
            idempotency_key: IdempotencyKey::from("key-1"),
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "changes": [{
                    "entity": "volk",
                    "id": "8a3c6e2e-1111-4e5b-9c1d-000000000001",
                    "operation": "delete",
                    "timestamp": "2024-05-01T10:00:00.000Z"
                }],
                "idempotencyKey": "key-1"
            })
        );
    }

    #[test]
    fn generated_keys_differ() {
        let a = PushRequest::new(Vec::new());
        let b = PushRequest::new(Vec::new());
        assert_ne!(a.idempotency_key, b.idempotency_key);
    }

    #[test]
    fn pull_response_parses() {
        let body = json!({
            "changes": [{
                "entity": "standort",
                "id": "x",
                "operation": "update",
                "data": {"name": "Waldrand"},
                "timestamp": "2024-05-01T10:00:00Z"
            }],
            "cursor": "118"
        });
        let response: PullResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.cursor, "118");
        assert_eq!(response.changes[0].operation, Operation::Update);
        assert!(response.changes[0].data.is_some());
    }

    #[test]
    fn pull_request_defaults_to_start() {
        let request = PullRequest::from_cursor(&SyncCursor::default());
        assert_eq!(request.cursor, "0");
    }
}
