//! In-memory image rebuilt from the journal.

use crate::changelog::ChangeLog;
use crate::cursor::SyncCursor;
use crate::entity::EntityStore;
use crate::journal::{JournalOp, JournalRecord, RecordType};
use crate::types::DeviceId;

/// Everything the journal persists.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub entities: EntityStore,
    pub changes: ChangeLog,
    pub cursor: SyncCursor,
    pub device_id: Option<DeviceId>,
}

impl StoreState {
    pub fn new() -> Self {
        Self {
            changes: ChangeLog::new(),
            ..Self::default()
        }
    }

    /// Replays a recovered record.
    pub fn replay(&mut self, record: JournalRecord) {
        if record.record_type == RecordType::Snapshot {
            *self = Self::new();
        }
        for op in record.ops {
            self.apply(op);
        }
    }

    pub fn apply(&mut self, op: JournalOp) {
        match op {
            JournalOp::PutEntity(entity) => {
                self.entities.put(entity);
            }
            JournalOp::AppendChange(entry) => self.changes.append(entry),
            JournalOp::MarkSynced(ids) => {
                self.changes.mark_synced(&ids);
            }
            JournalOp::CompactSynced => {
                self.changes.compact_synced();
            }
            JournalOp::SetCursor(cursor) => self.cursor = cursor,
            JournalOp::SetDeviceId(id) => self.device_id = Some(id),
        }
    }

    /// Full image as a snapshot record.
    pub fn snapshot(&self) -> JournalRecord {
        let mut ops = Vec::with_capacity(self.entities.len() + self.changes.len() + 2);
        if let Some(id) = self.device_id {
            ops.push(JournalOp::SetDeviceId(id));
        }
        ops.push(JournalOp::SetCursor(self.cursor.clone()));
        ops.extend(self.entities.iter().cloned().map(JournalOp::PutEntity));
        ops.extend(self.changes.iter().cloned().map(JournalOp::AppendChange));
        JournalRecord::snapshot(ops)
    }
}
