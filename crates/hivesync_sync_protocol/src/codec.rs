//! Conversion between local entities and JSON payloads.
//!
//! A payload is a flat JSON object. The shared bookkeeping members are
//! `id`, `createdAt`, `updatedAt`, `updatedBy` and `deletedAt`. Every other
//! member is a kind-specific field. Date fields travel as ISO-8601 strings
//! and are parsed back into timestamps on the way in. Which members count
//! as dates is decided by [`EntityKind::is_date_field`].

use crate::error::{ProtocolError, ProtocolResult};
use crate::messages::WireChange;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use hivesync_core::{ChangeLogEntry, Entity, EntityId, EntityKind, FieldValue, Operation};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

const ID: &str = "id";
const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";
const UPDATED_BY: &str = "updatedBy";
const DELETED_AT: &str = "deletedAt";

/// A decoded remote change, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// Put this revision, replacing whatever is stored.
    Upsert(Entity),
    /// Tombstone the row, inserting a bare tombstone if it is absent.
    Delete {
        /// Kind of the deleted entity.
        kind: EntityKind,
        /// Deleted entity.
        id: EntityId,
        /// Time of the delete.
        at: DateTime<Utc>,
    },
}

impl RemoteChange {
    /// Id of the entity this change touches.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            RemoteChange::Upsert(entity) => entity.id,
            RemoteChange::Delete { id, .. } => *id,
        }
    }
}

/// Formats a timestamp the way the remote expects it.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an ISO-8601 timestamp. A bare date is taken as midnight UTC.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Renders an entity as a payload object.
#[must_use]
pub fn entity_to_payload(entity: &Entity) -> Value {
    let mut object = Map::new();
    for (name, value) in &entity.fields {
        object.insert(name.clone(), field_to_json(value));
    }
    object.insert(ID.into(), Value::String(entity.id.to_string()));
    object.insert(
        CREATED_AT.into(),
        Value::String(format_timestamp(&entity.created_at)),
    );
    object.insert(
        UPDATED_AT.into(),
        Value::String(format_timestamp(&entity.updated_at)),
    );
    if let Some(actor) = &entity.updated_by {
        object.insert(UPDATED_BY.into(), Value::String(actor.clone()));
    }
    if let Some(deleted_at) = &entity.deleted_at {
        object.insert(DELETED_AT.into(), Value::String(format_timestamp(deleted_at)));
    }
    Value::Object(object)
}

/// Parses a payload object into an entity of `kind` with id `id`.
///
/// `createdAt` is required. A missing `updatedAt` falls back to
/// `createdAt`, since some kinds never carry one.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedChange`] if the payload is not an
/// object, its `id` disagrees with `id`, a required member is missing, or
/// a date field does not parse.
pub fn entity_from_payload(kind: EntityKind, id: EntityId, payload: &Value) -> ProtocolResult<Entity> {
    let bad = |reason: String| ProtocolError::malformed(kind.wire_name(), id.to_string(), reason);

    let object = payload
        .as_object()
        .ok_or_else(|| bad("payload is not an object".into()))?;

    if let Some(raw) = object.get(ID) {
        let same = raw
            .as_str()
            .and_then(|s| s.parse::<EntityId>().ok())
            .is_some_and(|payload_id| payload_id == id);
        if !same {
            return Err(bad(format!("payload id {raw} does not match")));
        }
    }

    let created_at = match object.get(CREATED_AT) {
        Some(Value::String(s)) => {
            parse_timestamp(s).ok_or_else(|| bad(format!("unparseable {CREATED_AT}: {s}")))?
        }
        _ => return Err(bad(format!("missing {CREATED_AT}"))),
    };
    let updated_at = optional_timestamp(object, UPDATED_AT).map_err(bad)?.unwrap_or(created_at);
    let deleted_at = optional_timestamp(object, DELETED_AT).map_err(bad)?;
    let updated_by = match object.get(UPDATED_BY) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => return Err(bad(format!("{UPDATED_BY} is not a string: {other}"))),
    };

    let mut fields = BTreeMap::new();
    for (name, value) in object {
        if matches!(
            name.as_str(),
            ID | CREATED_AT | UPDATED_AT | UPDATED_BY | DELETED_AT
        ) {
            continue;
        }
        let field = if kind.is_date_field(name) {
            date_field(name, value).map_err(bad)?
        } else {
            json_to_field(value)
        };
        fields.insert(name.clone(), field);
    }

    Ok(Entity {
        id,
        kind,
        created_at,
        updated_at,
        updated_by,
        deleted_at,
        fields,
    })
}

/// Decodes one wire change.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownEntity`] for an entity name this client
/// does not know, and [`ProtocolError::MalformedChange`] for a bad id,
/// timestamp or payload, or a create/update that carries no payload.
pub fn decode_change(change: &WireChange) -> ProtocolResult<RemoteChange> {
    let kind: EntityKind = change
        .entity
        .parse()
        .map_err(|_| ProtocolError::UnknownEntity(change.entity.clone()))?;
    let bad = |reason: &str| ProtocolError::malformed(&change.entity, &change.id, reason);

    let id: EntityId = change.id.parse().map_err(|_| bad("id is not a UUID"))?;
    let at = parse_timestamp(&change.timestamp).ok_or_else(|| bad("unparseable timestamp"))?;

    match change.operation {
        Operation::Create | Operation::Update => {
            let payload = change
                .data
                .as_ref()
                .ok_or_else(|| bad("missing data"))?;
            entity_from_payload(kind, id, payload).map(RemoteChange::Upsert)
        }
        Operation::Delete => Ok(RemoteChange::Delete { kind, id, at }),
    }
}

/// Decodes a whole batch, stopping at the first bad change.
pub fn decode_batch(changes: &[WireChange]) -> ProtocolResult<Vec<RemoteChange>> {
    changes.iter().map(decode_change).collect()
}

/// Builds the outgoing change for an entity's first unsynced entry.
///
/// `current` is the entity row as it stands now. It is sent as the payload
/// unless the operation is a delete.
#[must_use]
pub fn encode_push_change(first: &ChangeLogEntry, current: Option<&Entity>) -> WireChange {
    let data = if first.operation.carries_payload() {
        current.map(entity_to_payload)
    } else {
        None
    };
    WireChange {
        entity: first.kind.wire_name().to_string(),
        id: first.entity_id.to_string(),
        operation: first.operation,
        data,
        timestamp: format_timestamp(&first.timestamp),
    }
}

fn optional_timestamp(object: &Map<String, Value>, name: &str) -> Result<Option<DateTime<Utc>>, String> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| format!("unparseable {name}: {s}")),
        Some(other) => Err(format!("{name} is not a string: {other}")),
    }
}

fn date_field(name: &str, value: &Value) -> Result<FieldValue, String> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::String(s) => parse_timestamp(s)
            .map(FieldValue::Timestamp)
            .ok_or_else(|| format!("unparseable {name}: {s}")),
        other => Err(format!("{name} is not a date: {other}")),
    }
}

fn json_to_field(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        // Integers past i64 keep their exact digits as text.
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => FieldValue::Integer(i),
            (None, Some(u)) => FieldValue::Text(u.to_string()),
            (None, None) => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => FieldValue::Text(s.clone()),
        Value::Array(items) => FieldValue::List(items.iter().map(json_to_field).collect()),
        Value::Object(members) => FieldValue::Object(
            members
                .iter()
                .map(|(k, v)| (k.clone(), json_to_field(v)))
                .collect(),
        ),
    }
}

fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Integer(i) => Value::Number((*i).into()),
        FieldValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Timestamp(ts) => Value::String(format_timestamp(ts)),
        FieldValue::List(items) => Value::Array(items.iter().map(field_to_json).collect()),
        FieldValue::Object(members) => Value::Object(
            members
                .iter()
                .map(|(k, v)| (k.clone(), field_to_json(v)))
                .collect(),
        ),
    }
}
