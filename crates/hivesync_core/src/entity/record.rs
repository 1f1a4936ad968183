//! The entity record.

use super::{EntityId, EntityKind, FieldValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One revision of a domain entity.
///
/// The bookkeeping fields every kind shares are typed members. Everything
/// kind-specific lives in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Merge key across devices.
    pub id: EntityId,
    /// Domain type.
    pub kind: EntityKind,
    /// When the entity was first created.
    pub created_at: DateTime<Utc>,
    /// When this revision was produced.
    pub updated_at: DateTime<Utc>,
    /// Actor that produced this revision.
    pub updated_by: Option<String>,
    /// Set once the entity is logically deleted.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Kind-specific fields.
    pub fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    /// Creates a fresh entity with a random id.
    #[must_use]
    pub fn new(kind: EntityKind, now: DateTime<Utc>) -> Self {
        Self::with_id(EntityId::new(), kind, now)
    }

    /// Creates a fresh entity with a caller-chosen id.
    #[must_use]
    pub fn with_id(id: EntityId, kind: EntityKind, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            created_at: now,
            updated_at: now,
            updated_by: None,
            deleted_at: None,
            fields: BTreeMap::new(),
        }
    }

    /// Creates a bare tombstone for an id this device has never seen.
    #[must_use]
    pub fn tombstone(id: EntityId, kind: EntityKind, at: DateTime<Utc>) -> Self {
        let mut entity = Self::with_id(id, kind, at);
        entity.deleted_at = Some(at);
        entity
    }

    /// Sets a field, builder style.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets the author of this revision, builder style.
    #[must_use]
    pub fn updated_by(mut self, actor: impl Into<String>) -> Self {
        self.updated_by = Some(actor.into());
        self
    }

    /// Sets a field in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns true unless the entity is tombstoned.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Marks the entity deleted at `at`.
    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
        self.updated_at = at;
    }
}
