//! Atomic units of work spanning entities, change log and cursor.

use crate::changelog::ChangeLogEntry;
use crate::cursor::SyncCursor;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{CoreError, CoreResult};
use crate::journal::JournalOp;
use crate::state::StoreState;
use crate::types::{ChangeId, DeviceId, Operation};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A write transaction over the local store.
///
/// Writes are buffered and become visible to other readers only when the
/// closure passed to [`crate::LocalStore::transaction`] returns `Ok` and
/// the journal commit succeeds. Reads inside the transaction see its own
/// buffered writes.
pub struct Transaction<'a> {
    base: &'a StoreState,
    device_id: DeviceId,
    ops: Vec<JournalOp>,
    entities: BTreeMap<EntityId, Entity>,
    appended: Vec<ChangeLogEntry>,
    acknowledged: HashSet<ChangeId>,
    cursor: Option<SyncCursor>,
    next_sequence: u64,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(base: &'a StoreState, device_id: DeviceId) -> Self {
        Self {
            base,
            device_id,
            ops: Vec::new(),
            entities: BTreeMap::new(),
            appended: Vec::new(),
            acknowledged: HashSet::new(),
            cursor: None,
            next_sequence: base.changes.next_sequence(),
        }
    }

    pub(crate) fn into_ops(self) -> Vec<JournalOp> {
        self.ops
    }

    /// Id of the device this store belongs to.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    // Entities

    /// Returns the live revision for `id`.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.get_including_tombstones(id).filter(|e| e.is_live())
    }

    /// Returns the current revision for `id`, tombstoned or not.
    #[must_use]
    pub fn get_including_tombstones(&self, id: &EntityId) -> Option<&Entity> {
        self.entities
            .get(id)
            .or_else(|| self.base.entities.get_including_tombstones(id))
    }

    /// Upserts by id, replacing any existing revision.
    pub fn put(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity.clone());
        self.ops.push(JournalOp::PutEntity(entity));
    }

    /// Tombstones the row for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] if no row exists.
    pub fn soft_delete(&mut self, id: &EntityId, at: DateTime<Utc>) -> CoreResult<Entity> {
        let mut row = self
            .get_including_tombstones(id)
            .cloned()
            .ok_or(CoreError::EntityNotFound(*id))?;
        if row.is_live() {
            row.mark_deleted(at);
            self.put(row.clone());
        }
        Ok(row)
    }

    // Change log

    /// Appends an entry, assigning the next insertion sequence.
    pub fn append(&mut self, mut entry: ChangeLogEntry) -> ChangeLogEntry {
        entry.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.appended.push(entry.clone());
        self.ops.push(JournalOp::AppendChange(entry.clone()));
        entry
    }

    /// Appends an unsynced entry stamped with this device's id.
    pub fn record_change(
        &mut self,
        kind: EntityKind,
        entity_id: EntityId,
        operation: Operation,
        timestamp: DateTime<Utc>,
    ) -> ChangeLogEntry {
        let entry = ChangeLogEntry::new(kind, entity_id, operation, timestamp, self.device_id);
        self.append(entry)
    }

    /// Unsynced entries in insertion order, including ones appended here.
    #[must_use]
    pub fn list_unsynced(&self) -> Vec<ChangeLogEntry> {
        self.base
            .changes
            .list_unsynced()
            .into_iter()
            .chain(self.appended.iter())
            .filter(|e| !self.acknowledged.contains(&e.id))
            .cloned()
            .collect()
    }

    /// Ids of entities that still have unsynced entries.
    #[must_use]
    pub fn unsynced_entity_ids(&self) -> BTreeSet<EntityId> {
        self.list_unsynced().into_iter().map(|e| e.entity_id).collect()
    }

    /// Flags entries as acknowledged. Repeats and unknown ids are no-ops.
    pub fn mark_synced(&mut self, ids: &[ChangeId]) {
        if ids.is_empty() {
            return;
        }
        self.acknowledged.extend(ids.iter().copied());
        self.ops.push(JournalOp::MarkSynced(ids.to_vec()));
    }

    /// Drops acknowledged entries when the transaction commits.
    pub fn compact_synced(&mut self) {
        self.ops.push(JournalOp::CompactSynced);
    }

    // Cursor

    /// Current cursor, including an update staged in this transaction.
    #[must_use]
    pub fn cursor(&self) -> &SyncCursor {
        self.cursor.as_ref().unwrap_or(&self.base.cursor)
    }

    /// Replaces the cursor record.
    pub fn set_cursor(&mut self, cursor: SyncCursor) {
        self.cursor = Some(cursor.clone());
        self.ops.push(JournalOp::SetCursor(cursor));
    }
}
