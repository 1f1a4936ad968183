//! The materialized entity table.

use super::{Entity, EntityId, EntityKind};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Last-writer-wins register of entities keyed by id.
///
/// This is the in-memory image rebuilt from the journal. It does not log
/// mutations on its own; [`crate::Transaction`] pairs every write with a
/// change-log append and a journal record.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    rows: BTreeMap<EntityId, Entity>,
}

impl EntityStore {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts by id, replacing any existing revision unconditionally.
    ///
    /// Returns the replaced revision, if any.
    pub fn put(&mut self, entity: Entity) -> Option<Entity> {
        self.rows.insert(entity.id, entity)
    }

    /// Returns the live revision for `id`.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.rows.get(id).filter(|e| e.is_live())
    }

    /// Returns the stored revision for `id`, tombstoned or not.
    #[must_use]
    pub fn get_including_tombstones(&self, id: &EntityId) -> Option<&Entity> {
        self.rows.get(id)
    }

    /// Live entities of `kind` matching `predicate`, ordered by id.
    pub fn query<P>(&self, kind: EntityKind, predicate: P) -> Vec<&Entity>
    where
        P: Fn(&Entity) -> bool,
    {
        self.rows
            .values()
            .filter(|e| e.kind == kind && e.is_live() && predicate(e))
            .collect()
    }

    /// Like [`EntityStore::query`] but also returns tombstones.
    pub fn query_with_tombstones<P>(&self, kind: EntityKind, predicate: P) -> Vec<&Entity>
    where
        P: Fn(&Entity) -> bool,
    {
        self.rows
            .values()
            .filter(|e| e.kind == kind && predicate(e))
            .collect()
    }

    /// Tombstones the row for `id` and returns the new revision.
    ///
    /// Deleting an already-deleted row keeps its original `deleted_at`.
    pub fn soft_delete(&mut self, id: &EntityId, at: DateTime<Utc>) -> CoreResult<Entity> {
        let row = self.rows.get_mut(id).ok_or(CoreError::EntityNotFound(*id))?;
        if row.is_live() {
            row.mark_deleted(at);
        }
        Ok(row.clone())
    }

    /// Every stored row, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.rows.values()
    }

    /// Number of stored rows, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_replaces_regardless_of_timestamps() {
        let now = Utc::now();
        let mut store = EntityStore::new();
        let newer = Entity::new(EntityKind::Colony, now).with_field("stocknr", "new");
        let mut older = newer.clone().with_field("stocknr", "old");
        older.updated_at = now - chrono::Duration::days(1);

        store.put(newer);
        store.put(older.clone());

        assert_eq!(store.get(&older.id), Some(&older));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn soft_delete_hides_from_get_and_query() {
        let mut store = EntityStore::new();
        let loc = Entity::new(EntityKind::Location, Utc::now());
        let id = loc.id;
        store.put(loc);

        let tomb = store.soft_delete(&id, Utc::now()).unwrap();
        assert!(!tomb.is_live());
        assert!(store.get(&id).is_none());
        assert!(store.get_including_tombstones(&id).is_some());
        assert!(store.query(EntityKind::Location, |_| true).is_empty());
        assert_eq!(store.query_with_tombstones(EntityKind::Location, |_| true).len(), 1);
    }

    #[test]
    fn soft_delete_twice_keeps_first_timestamp() {
        let mut store = EntityStore::new();
        let loc = Entity::new(EntityKind::Location, Utc::now());
        let id = loc.id;
        store.put(loc);

        let first = Utc::now();
        store.soft_delete(&id, first).unwrap();
        let again = store
            .soft_delete(&id, first + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(again.deleted_at, Some(first));
    }

    #[test]
    fn soft_delete_missing_is_not_found() {
        let mut store = EntityStore::new();
        let result = store.soft_delete(&EntityId::new(), Utc::now());
        assert!(matches!(result, Err(CoreError::EntityNotFound(_))));
    }

    #[test]
    fn query_filters_by_kind_and_predicate() {
        let now = Utc::now();
        let mut store = EntityStore::new();
        store.put(Entity::new(EntityKind::Colony, now).with_field("stocknr", "A"));
        store.put(Entity::new(EntityKind::Colony, now).with_field("stocknr", "B"));
        store.put(Entity::new(EntityKind::Queen, now).with_field("stocknr", "A"));

        let hits = store.query(EntityKind::Colony, |e| {
            e.field("stocknr").and_then(|v| v.as_str()) == Some("A")
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, EntityKind::Colony);
    }
}
