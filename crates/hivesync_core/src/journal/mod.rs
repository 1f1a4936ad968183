//! Append-only journal that persists every committed transaction.

mod record;

pub use record::{JournalOp, JournalRecord, RecordType};

use crate::error::CoreResult;
use hivesync_storage::StorageBackend;
use tracing::{debug, warn};

/// Framed commit log over a storage backend.
pub struct Journal {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
}

impl Journal {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend,
            sync_on_commit,
        }
    }

    /// Reads every complete record.
    ///
    /// A partially written record at the end is dropped and the backend is
    /// truncated to the last complete one. Corruption anywhere else is an
    /// error.
    pub fn recover(&mut self) -> CoreResult<Vec<JournalRecord>> {
        let bytes = self.backend.read_all()?;
        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < bytes.len() {
            match JournalRecord::decode(&bytes[offset..], offset as u64)? {
                Some((record, consumed)) => {
                    records.push(record);
                    offset += consumed;
                }
                None => {
                    warn!(
                        offset,
                        dropped = bytes.len() - offset,
                        "dropping torn journal tail"
                    );
                    self.backend.truncate(offset as u64)?;
                    break;
                }
            }
        }

        debug!(records = records.len(), bytes = offset, "journal recovered");
        Ok(records)
    }

    /// Appends a record and makes it durable per configuration.
    pub fn append(&mut self, record: &JournalRecord) -> CoreResult<u64> {
        let data = record.encode()?;
        let offset = self.backend.append(&data)?;
        if self.sync_on_commit {
            self.backend.sync()?;
        } else {
            self.backend.flush()?;
        }
        Ok(offset)
    }

    /// Replaces the whole journal with a single record.
    pub fn rewrite(&mut self, record: &JournalRecord) -> CoreResult<()> {
        let data = record.encode()?;
        self.backend.replace(&data)?;
        Ok(())
    }

    /// Current journal size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Forces buffered bytes to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}
