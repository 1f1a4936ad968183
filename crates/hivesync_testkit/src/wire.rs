//! Builders for changes as a remote would send them.

use hivesync_core::chrono::{DateTime, Utc};
use hivesync_core::{Entity, EntityId, EntityKind, Operation};
use hivesync_sync_protocol::codec::{entity_to_payload, format_timestamp};
use hivesync_sync_protocol::{PullResponse, WireChange};

/// A create or update carrying the full payload of `entity`.
pub fn remote_upsert(entity: &Entity, operation: Operation) -> WireChange {
    WireChange {
        entity: entity.kind.wire_name().to_string(),
        id: entity.id.to_string(),
        operation,
        data: Some(entity_to_payload(entity)),
        timestamp: format_timestamp(&entity.updated_at),
    }
}

/// A delete with no payload.
pub fn remote_delete(kind: EntityKind, id: EntityId, at: DateTime<Utc>) -> WireChange {
    WireChange {
        entity: kind.wire_name().to_string(),
        id: id.to_string(),
        operation: Operation::Delete,
        data: None,
        timestamp: format_timestamp(&at),
    }
}

/// A change naming an entity kind nobody knows.
pub fn unknown_kind_change() -> WireChange {
    WireChange {
        entity: "honigernte".to_string(),
        id: EntityId::new().to_string(),
        operation: Operation::Create,
        data: Some(serde_json::json!({"createdAt": "2024-05-01T08:00:00.000Z"})),
        timestamp: "2024-05-01T08:00:00.000Z".to_string(),
    }
}

/// A pull response carrying `changes` and ending at `cursor`.
pub fn pull_page(changes: Vec<WireChange>, cursor: &str) -> PullResponse {
    PullResponse {
        changes,
        cursor: cursor.to_string(),
    }
}
