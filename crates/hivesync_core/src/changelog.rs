//! The per-device change log.

use crate::entity::{EntityId, EntityKind};
use crate::types::{ChangeId, DeviceId, Operation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One local mutation awaiting (or past) upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Entry id.
    pub id: ChangeId,
    /// Insertion position on this device. Strictly increasing.
    pub sequence: u64,
    /// Kind of the mutated entity.
    pub kind: EntityKind,
    /// The mutated entity.
    pub entity_id: EntityId,
    /// What happened.
    pub operation: Operation,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Device that made the change.
    pub device_id: DeviceId,
    /// Whether the remote has acknowledged the entry.
    pub synced: bool,
}

impl ChangeLogEntry {
    /// Creates an unsynced entry. The sequence is assigned on append.
    #[must_use]
    pub fn new(
        kind: EntityKind,
        entity_id: EntityId,
        operation: Operation,
        timestamp: DateTime<Utc>,
        device_id: DeviceId,
    ) -> Self {
        Self {
            id: ChangeId::new(),
            sequence: 0,
            kind,
            entity_id,
            operation,
            timestamp,
            device_id,
            synced: false,
        }
    }
}

/// Append-only ledger of local mutations, ordered by insertion.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    entries: BTreeMap<u64, ChangeLogEntry>,
    by_id: HashMap<ChangeId, u64>,
    next_sequence: u64,
}

impl ChangeLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_id: HashMap::new(),
            next_sequence: 1,
        }
    }

    /// Sequence the next appended entry will receive.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.max(1)
    }

    /// Inserts an entry that already carries its sequence.
    pub fn append(&mut self, entry: ChangeLogEntry) {
        self.next_sequence = self.next_sequence().max(entry.sequence + 1);
        self.by_id.insert(entry.id, entry.sequence);
        self.entries.insert(entry.sequence, entry);
    }

    /// Unsynced entries in insertion order.
    #[must_use]
    pub fn list_unsynced(&self) -> Vec<&ChangeLogEntry> {
        self.entries.values().filter(|e| !e.synced).collect()
    }

    /// All entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeLogEntry> {
        self.entries.values()
    }

    /// Looks up an entry by id.
    #[must_use]
    pub fn get(&self, id: &ChangeId) -> Option<&ChangeLogEntry> {
        self.by_id.get(id).and_then(|seq| self.entries.get(seq))
    }

    /// Flags entries as acknowledged.
    ///
    /// Already-synced and unknown ids are ignored. Returns how many
    /// entries actually flipped.
    pub fn mark_synced(&mut self, ids: &[ChangeId]) -> usize {
        let mut flipped = 0;
        for id in ids {
            let Some(seq) = self.by_id.get(id) else {
                continue;
            };
            if let Some(entry) = self.entries.get_mut(seq) {
                if !entry.synced {
                    entry.synced = true;
                    flipped += 1;
                }
            }
        }
        flipped
    }

    /// Drops acknowledged entries. Returns how many were removed.
    pub fn compact_synced(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.synced);
        self.by_id.retain(|_, seq| self.entries.contains_key(seq));
        before - self.entries.len()
    }

    /// Ids of entities with at least one unsynced entry.
    #[must_use]
    pub fn unsynced_entity_ids(&self) -> BTreeSet<EntityId> {
        self.entries
            .values()
            .filter(|e| !e.synced)
            .map(|e| e.entity_id)
            .collect()
    }

    /// Number of unsynced entries.
    #[must_use]
    pub fn unsynced_len(&self) -> usize {
        self.entries.values().filter(|e| !e.synced).count()
    }

    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the log holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
