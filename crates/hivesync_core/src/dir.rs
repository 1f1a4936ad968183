//! On-device layout of a local store.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK               # Advisory lock, one process per store
//! └─ hivesync.journal   # Framed commit log
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "hivesync.journal";

/// Exclusive handle on a store directory.
///
/// The lock is released when this value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens (and optionally creates) the directory and takes the lock.
    ///
    /// Every failure maps to [`CoreError::Unavailable`]: without a usable
    /// directory there is no persistence and the store must not pretend
    /// otherwise.
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(CoreError::unavailable(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
            fs::create_dir_all(path).map_err(|e| {
                CoreError::unavailable(format!("cannot create {}: {e}", path.display()))
            })?;
        }

        if !path.is_dir() {
            return Err(CoreError::unavailable(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))
            .map_err(|e| CoreError::unavailable(format!("cannot open lock file: {e}")))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::unavailable(
                "store is locked by another process",
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal file path.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }
}
