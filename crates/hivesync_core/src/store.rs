//! The local store: entity tables, change log and cursor behind one journal.

use crate::changelog::ChangeLogEntry;
use crate::config::Config;
use crate::cursor::SyncCursor;
use crate::dir::StoreDir;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{CoreError, CoreResult};
use crate::journal::{Journal, JournalOp, JournalRecord};
use crate::state::StoreState;
use crate::transaction::Transaction;
use crate::types::{ChangeId, DeviceId, Operation};
use chrono::{DateTime, Utc};
use hivesync_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The device-local system of record.
///
/// A `LocalStore` owns the entity tables, the change log and the sync
/// cursor. All three are persisted through a single journal, so a
/// [`LocalStore::transaction`] that touches more than one of them is
/// committed as one record or not at all.
///
/// The store has an explicit lifecycle: construct it with
/// [`LocalStore::open`] or [`LocalStore::open_in_memory`], share it behind an
/// `Arc`, and call [`LocalStore::close`] when done. There is no fallback
/// object: if persistence is unavailable, construction fails.
///
/// # Example
///
/// ```rust
/// use hivesync_core::{Entity, EntityKind, LocalStore};
///
/// let store = LocalStore::open_in_memory().unwrap();
/// let colony = Entity::new(EntityKind::Colony, chrono::Utc::now())
///     .with_field("stocknr", "V-01");
/// store.create(colony.clone()).unwrap();
///
/// assert_eq!(store.get(&colony.id).unwrap(), Some(colony));
/// assert_eq!(store.list_unsynced().unwrap().len(), 1);
/// ```
pub struct LocalStore {
    config: Config,
    state: RwLock<StoreState>,
    journal: Mutex<Journal>,
    device_id: DeviceId,
    dir: Mutex<Option<StoreDir>>,
    is_open: RwLock<bool>,
}

impl LocalStore {
    /// Opens or creates a store in `path` with default configuration.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Unavailable`] if the directory cannot be created,
    ///   opened or locked
    /// - [`CoreError::JournalCorrupted`] if the journal fails validation
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens or creates a store in `path`.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.journal_path())
            .map_err(|e| CoreError::unavailable(format!("cannot open journal: {e}")))?;
        let store = Self::with_backend(Box::new(backend), config)?;
        *store.dir.lock() = Some(dir);
        info!(path = %path.display(), device_id = %store.device_id, "opened local store");
        Ok(store)
    }

    /// Creates an ephemeral store with nothing on disk.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::with_backend(Box::new(InMemoryBackend::new()), Config::default())
    }

    /// Opens a store over an arbitrary storage backend.
    ///
    /// The journal is replayed. If this is the first open, a device id is
    /// generated and persisted.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        let mut journal = Journal::new(backend, config.sync_on_commit);
        let mut state = StoreState::new();
        for record in journal.recover()? {
            state.replay(record);
        }

        let device_id = match state.device_id {
            Some(id) => id,
            None => {
                let id = DeviceId::new();
                journal.append(&JournalRecord::commit(vec![JournalOp::SetDeviceId(id)]))?;
                state.device_id = Some(id);
                debug!(device_id = %id, "assigned new device id");
                id
            }
        };

        Ok(Self {
            config,
            state: RwLock::new(state),
            journal: Mutex::new(journal),
            device_id,
            dir: Mutex::new(None),
            is_open: RwLock::new(true),
        })
    }

    /// Runs `f` as one atomic unit.
    ///
    /// If `f` returns `Err`, nothing is written. Otherwise the buffered
    /// writes are journaled as a single record and then applied. If the
    /// journal write fails, the in-memory image is left untouched and the
    /// error is returned.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    {
        self.ensure_open()?;
        let mut state = self.state.write();

        let (result, ops) = {
            let mut txn = Transaction::new(&state, self.device_id);
            let result = f(&mut txn)?;
            (result, txn.into_ops())
        };

        if ops.is_empty() {
            return Ok(result);
        }

        self.journal
            .lock()
            .append(&JournalRecord::commit(ops.clone()))?;
        for op in ops {
            state.apply(op);
        }
        Ok(result)
    }

    /// Inserts a new entity and logs a `create`.
    pub fn create(&self, entity: Entity) -> CoreResult<ChangeLogEntry> {
        self.transaction(|txn| {
            let (kind, id) = (entity.kind, entity.id);
            txn.put(entity);
            Ok(txn.record_change(kind, id, Operation::Create, Utc::now()))
        })
    }

    /// Replaces an existing live entity and logs an `update`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] if no live row has this id.
    pub fn update(&self, entity: Entity) -> CoreResult<ChangeLogEntry> {
        self.transaction(|txn| {
            if txn.get(&entity.id).is_none() {
                return Err(CoreError::EntityNotFound(entity.id));
            }
            let (kind, id) = (entity.kind, entity.id);
            txn.put(entity);
            Ok(txn.record_change(kind, id, Operation::Update, Utc::now()))
        })
    }

    /// Tombstones an entity and logs a `delete`.
    pub fn delete(&self, id: &EntityId) -> CoreResult<ChangeLogEntry> {
        self.delete_at(id, Utc::now())
    }

    /// Tombstones an entity at `at` and logs a `delete`.
    pub fn delete_at(&self, id: &EntityId, at: DateTime<Utc>) -> CoreResult<ChangeLogEntry> {
        self.transaction(|txn| {
            if txn.get(id).is_none() {
                return Err(CoreError::EntityNotFound(*id));
            }
            let tomb = txn.soft_delete(id, at)?;
            Ok(txn.record_change(tomb.kind, *id, Operation::Delete, at))
        })
    }

    /// Returns the live revision for `id`.
    pub fn get(&self, id: &EntityId) -> CoreResult<Option<Entity>> {
        self.ensure_open()?;
        Ok(self.state.read().entities.get(id).cloned())
    }

    /// Returns the stored revision for `id`, tombstoned or not.
    pub fn get_including_tombstones(&self, id: &EntityId) -> CoreResult<Option<Entity>> {
        self.ensure_open()?;
        Ok(self.state.read().entities.get_including_tombstones(id).cloned())
    }

    /// Live entities of `kind` matching `predicate`.
    pub fn query<P>(&self, kind: EntityKind, predicate: P) -> CoreResult<Vec<Entity>>
    where
        P: Fn(&Entity) -> bool,
    {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(state
            .entities
            .query(kind, predicate)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Entities of `kind` matching `predicate`, tombstones included.
    pub fn query_with_tombstones<P>(&self, kind: EntityKind, predicate: P) -> CoreResult<Vec<Entity>>
    where
        P: Fn(&Entity) -> bool,
    {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(state
            .entities
            .query_with_tombstones(kind, predicate)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Unsynced change-log entries in insertion order.
    pub fn list_unsynced(&self) -> CoreResult<Vec<ChangeLogEntry>> {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(state.changes.list_unsynced().into_iter().cloned().collect())
    }

    /// Every change-log entry in insertion order.
    pub fn changes(&self) -> CoreResult<Vec<ChangeLogEntry>> {
        self.ensure_open()?;
        Ok(self.state.read().changes.iter().cloned().collect())
    }

    /// Flags entries as acknowledged. Repeats are no-ops.
    pub fn mark_synced(&self, ids: &[ChangeId]) -> CoreResult<()> {
        self.transaction(|txn| {
            txn.mark_synced(ids);
            Ok(())
        })
    }

    /// Drops acknowledged change-log entries. Returns how many went.
    pub fn compact_synced(&self) -> CoreResult<usize> {
        self.ensure_open()?;
        let synced = {
            let state = self.state.read();
            state.changes.len() - state.changes.unsynced_len()
        };
        if synced == 0 {
            return Ok(0);
        }
        self.transaction(|txn| {
            txn.compact_synced();
            Ok(())
        })?;
        Ok(synced)
    }

    /// Returns the persisted sync cursor.
    pub fn cursor(&self) -> CoreResult<SyncCursor> {
        self.ensure_open()?;
        Ok(self.state.read().cursor.clone())
    }

    /// Returns this device's id.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Rewrites the journal as a single snapshot of the current image.
    pub fn checkpoint(&self) -> CoreResult<()> {
        self.ensure_open()?;
        let state = self.state.read();
        let mut journal = self.journal.lock();
        let before = journal.size()?;
        journal.rewrite(&state.snapshot())?;
        info!(before, after = journal.size()?, "journal checkpointed");
        Ok(())
    }

    /// Compacts and checkpoints once the journal outgrows the threshold.
    ///
    /// Returns true if a checkpoint ran.
    pub fn checkpoint_if_needed(&self) -> CoreResult<bool> {
        self.ensure_open()?;
        if self.journal_size()? < self.config.checkpoint_threshold_bytes {
            return Ok(false);
        }
        self.compact_synced()?;
        self.checkpoint()?;
        Ok(true)
    }

    /// Current journal size in bytes.
    pub fn journal_size(&self) -> CoreResult<u64> {
        self.journal.lock().size()
    }

    /// Directory backing this store, or `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.lock().as_ref().map(|d| d.path().to_path_buf())
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flushes the journal and releases the directory lock.
    ///
    /// Later calls fail with [`CoreError::StoreClosed`]. Closing twice is
    /// a no-op.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.journal.lock().sync()?;
        self.dir.lock().take();
        *is_open = false;
        debug!(device_id = %self.device_id, "closed local store");
        Ok(())
    }

    /// Returns true until [`LocalStore::close`] is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::StoreClosed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FieldValue;
    use tempfile::tempdir;

    fn colony(stocknr: &str) -> Entity {
        Entity::new(EntityKind::Colony, Utc::now()).with_field("stocknr", stocknr)
    }

    #[test]
    fn create_pairs_entity_and_change() {
        let store = LocalStore::open_in_memory().unwrap();
        let e = colony("V-01");
        let entry = store.create(e.clone()).unwrap();

        assert_eq!(store.get(&e.id).unwrap(), Some(e.clone()));
        let unsynced = store.list_unsynced().unwrap();
        assert_eq!(unsynced, vec![entry.clone()]);
        assert_eq!(entry.operation, Operation::Create);
        assert_eq!(entry.entity_id, e.id);
        assert_eq!(entry.device_id, store.device_id());
        assert!(!entry.synced);
    }

    #[test]
    fn update_requires_live_row() {
        let store = LocalStore::open_in_memory().unwrap();
        let result = store.update(colony("ghost"));
        assert!(matches!(result, Err(CoreError::EntityNotFound(_))));
        assert!(store.list_unsynced().unwrap().is_empty());
    }

    #[test]
    fn delete_tombstones_and_logs() {
        let store = LocalStore::open_in_memory().unwrap();
        let e = colony("V-02");
        store.create(e.clone()).unwrap();
        let entry = store.delete(&e.id).unwrap();

        assert_eq!(entry.operation, Operation::Delete);
        assert!(store.get(&e.id).unwrap().is_none());
        assert!(store.get_including_tombstones(&e.id).unwrap().is_some());
        assert_eq!(store.list_unsynced().unwrap().len(), 2);
    }

    #[test]
    fn failed_transaction_leaves_nothing() {
        let store = LocalStore::open_in_memory().unwrap();
        let e = colony("V-03");
        let result: CoreResult<()> = store.transaction(|txn| {
            txn.put(e.clone());
            txn.record_change(EntityKind::Colony, e.id, Operation::Create, Utc::now());
            Err(CoreError::InvalidArgument("abort".into()))
        });

        assert!(result.is_err());
        assert!(store.get(&e.id).unwrap().is_none());
        assert!(store.list_unsynced().unwrap().is_empty());
    }

    #[test]
    fn mark_synced_twice_is_noop() {
        let store = LocalStore::open_in_memory().unwrap();
        let entry = store.create(colony("V-04")).unwrap();
        store.mark_synced(&[entry.id]).unwrap();
        store.mark_synced(&[entry.id]).unwrap();

        assert!(store.list_unsynced().unwrap().is_empty());
        assert!(store.changes().unwrap()[0].synced);
    }

    #[test]
    fn reopen_replays_everything() {
        let dir = tempdir().unwrap();
        let e = colony("V-05");
        let device;
        {
            let store = LocalStore::open(dir.path()).unwrap();
            device = store.device_id();
            let entry = store.create(e.clone()).unwrap();
            store.mark_synced(&[entry.id]).unwrap();
            store
                .transaction(|txn| {
                    let next = txn.cursor().advanced_to("17");
                    txn.set_cursor(next);
                    Ok(())
                })
                .unwrap();
            store.close().unwrap();
        }

        let store = LocalStore::open(dir.path()).unwrap();
        assert_eq!(store.device_id(), device);
        assert_eq!(store.get(&e.id).unwrap(), Some(e));
        assert_eq!(store.cursor().unwrap().position(), "17");
        assert!(store.list_unsynced().unwrap().is_empty());
        assert_eq!(store.changes().unwrap().len(), 1);
    }

    #[test]
    fn torn_commit_is_not_visible_after_reopen() {
        let backend = InMemoryBackend::new();
        let e = colony("V-06");
        {
            let store = LocalStore::with_backend(Box::new(backend.clone()), Config::default())
                .unwrap();
            store.create(e.clone()).unwrap();
        }

        let mut bytes = backend.data();
        bytes.truncate(bytes.len() - 2);
        let store =
            LocalStore::with_backend(Box::new(InMemoryBackend::with_data(bytes)), Config::default())
                .unwrap();

        assert!(store.get(&e.id).unwrap().is_none());
        assert!(store.list_unsynced().unwrap().is_empty());
    }

    #[test]
    fn corrupted_journal_fails_to_open() {
        let backend = InMemoryBackend::new();
        {
            let store = LocalStore::with_backend(Box::new(backend.clone()), Config::default())
                .unwrap();
            store.create(colony("V-07")).unwrap();
        }
        backend.corrupt_byte(0, b'Z');

        let result = LocalStore::with_backend(Box::new(backend), Config::default());
        assert!(matches!(result, Err(CoreError::JournalCorrupted { .. })));
    }

    #[test]
    fn checkpoint_shrinks_and_preserves() {
        let dir = tempdir().unwrap();
        let e = colony("V-08");
        {
            let store = LocalStore::open(dir.path()).unwrap();
            store.create(e.clone()).unwrap();
            for i in 0..20 {
                let mut next = e.clone();
                next.set("notiz", FieldValue::Integer(i));
                store.update(next).unwrap();
            }
            let synced: Vec<_> = store.changes().unwrap().iter().map(|c| c.id).collect();
            store.mark_synced(&synced).unwrap();
            assert_eq!(store.compact_synced().unwrap(), 21);

            let before = store.journal_size().unwrap();
            store.checkpoint().unwrap();
            assert!(store.journal_size().unwrap() < before);
            store.close().unwrap();
        }

        let store = LocalStore::open(dir.path()).unwrap();
        let restored = store.get(&e.id).unwrap().unwrap();
        assert_eq!(restored.field("notiz"), Some(&FieldValue::Integer(19)));
        assert!(store.changes().unwrap().is_empty());
    }

    #[test]
    fn checkpoint_if_needed_respects_threshold() {
        let store = LocalStore::with_backend(
            Box::new(InMemoryBackend::new()),
            Config::new().checkpoint_threshold_bytes(u64::MAX),
        )
        .unwrap();
        store.create(colony("V-09")).unwrap();
        assert!(!store.checkpoint_if_needed().unwrap());

        let eager = LocalStore::with_backend(
            Box::new(InMemoryBackend::new()),
            Config::new().checkpoint_threshold_bytes(0),
        )
        .unwrap();
        eager.create(colony("V-10")).unwrap();
        assert!(eager.checkpoint_if_needed().unwrap());
    }

    #[test]
    fn closed_store_rejects_operations() {
        let store = LocalStore::open_in_memory().unwrap();
        store.close().unwrap();
        store.close().unwrap();

        assert!(!store.is_open());
        assert!(matches!(store.get(&EntityId::new()), Err(CoreError::StoreClosed)));
        assert!(matches!(
            store.create(colony("late")),
            Err(CoreError::StoreClosed)
        ));
    }

    #[test]
    fn locked_directory_is_unavailable() {
        let dir = tempdir().unwrap();
        let _first = LocalStore::open(dir.path()).unwrap();
        let second = LocalStore::open(dir.path());
        assert!(matches!(second, Err(CoreError::Unavailable { .. })));
    }

    #[test]
    fn close_releases_lock() {
        let dir = tempdir().unwrap();
        let first = LocalStore::open(dir.path()).unwrap();
        first.close().unwrap();
        assert!(LocalStore::open(dir.path()).is_ok());
    }
}
