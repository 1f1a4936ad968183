//! Test fixtures and store helpers.

use hivesync_core::chrono::{DateTime, TimeZone, Utc};
use hivesync_core::{Config, Entity, EntityKind, LocalStore};
use hivesync_storage::InMemoryBackend;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: LocalStore,
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: LocalStore::open_in_memory().expect("Failed to open in-memory store"),
            _temp_dir: None,
        }
    }

    /// Creates a new in-memory store over a backend the caller keeps a handle to.
    ///
    /// Clone the backend before passing it in to inspect or tear the journal
    /// bytes afterwards.
    pub fn over(backend: InMemoryBackend) -> Self {
        Self {
            store: LocalStore::with_backend(Box::new(backend), Config::default())
                .expect("Failed to open store over backend"),
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test store.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = LocalStore::open(&temp_dir.path().join("store"))
            .expect("Failed to open file store");
        Self {
            store,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-based.
    pub fn path(&self) -> Option<PathBuf> {
        self.store.path()
    }

    /// Closes and reopens a file-based store from disk.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores.
    pub fn reopen(self) -> Self {
        let path = self.path().expect("Only file stores can be reopened");
        let temp_dir = self._temp_dir;
        self.store.close().expect("Failed to close store");
        Self {
            store: LocalStore::open(&path).expect("Failed to reopen store"),
            _temp_dir: temp_dir,
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&LocalStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-based store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&LocalStore, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, &path)
}

/// A fixed instant, so assertions on timestamps are stable.
pub fn fixed_time(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0)
        .single()
        .expect("valid fixture date")
}

/// A location named `name`.
pub fn location(name: &str) -> Entity {
    Entity::new(EntityKind::Location, fixed_time(1, 8)).with_field("name", name)
}

/// A colony named `name`, not yet placed.
pub fn colony(name: &str) -> Entity {
    Entity::new(EntityKind::Colony, fixed_time(1, 8))
        .with_field("name", name)
        .with_field("status", "aktiv")
}

/// An inspection of `colony` on the given day.
pub fn inspection(colony: &Entity, day: u32) -> Entity {
    Entity::new(EntityKind::Inspection, fixed_time(day, 9))
        .with_field("volkId", colony.id.to_string())
        .with_field("datum", fixed_time(day, 9))
        .with_field("brut", true)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// The rows of [`populated_apiary`].
    pub struct Apiary {
        /// The single location.
        pub location: Entity,
        /// Colonies placed at the location.
        pub colonies: Vec<Entity>,
        /// One inspection per colony.
        pub inspections: Vec<Entity>,
    }

    /// Creates one location with `colony_count` colonies, each inspected once.
    ///
    /// Every row is written through [`LocalStore::create`], so the change log
    /// holds one unsynced entry per row.
    pub fn populated_apiary(store: &LocalStore, colony_count: usize) -> Apiary {
        let location = location("Waldrand");
        store.create(location.clone()).expect("Failed to create location");

        let mut colonies = Vec::with_capacity(colony_count);
        let mut inspections = Vec::with_capacity(colony_count);
        for i in 0..colony_count {
            let colony = colony(&format!("Volk {}", i + 1))
                .with_field("standortId", location.id.to_string());
            store.create(colony.clone()).expect("Failed to create colony");

            let inspection = inspection(&colony, 2 + (i as u32 % 20));
            store
                .create(inspection.clone())
                .expect("Failed to create inspection");

            colonies.push(colony);
            inspections.push(inspection);
        }

        Apiary {
            location,
            colonies,
            inspections,
        }
    }
}
