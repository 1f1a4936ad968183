//! Journal file on disk.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix of the scratch file written during [`StorageBackend::replace`].
const SCRATCH_SUFFIX: &str = ".next";

/// A storage backend over a single OS file.
///
/// `flush` hands bytes to the OS and `sync` calls `File::sync_all`.
/// `replace` writes the new image to a scratch file next to the journal,
/// fsyncs it and renames it into place, so after a crash the path holds
/// one complete image or the other.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    state: Mutex<OpenFile>,
}

#[derive(Debug)]
struct OpenFile {
    handle: File,
    len: u64,
}

impl OpenFile {
    fn open(path: &Path) -> io::Result<Self> {
        let handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = handle.metadata()?.len();
        Ok(Self { handle, len })
    }
}

impl FileBackend {
    /// Opens the journal at `path`, creating an empty one if it is missing.
    ///
    /// A scratch file left by an interrupted `replace` is removed; the
    /// journal itself was never touched by it.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let scratch = scratch_path(path);
        if scratch.exists() {
            fs::remove_file(&scratch)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(OpenFile::open(path)?),
        })
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(SCRATCH_SUFFIX);
    path.with_file_name(name)
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut state = self.state.lock();
        if offset.saturating_add(len as u64) > state.len {
            return Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: state.len,
            });
        }

        let mut buffer = vec![0u8; len];
        if len > 0 {
            state.handle.seek(SeekFrom::Start(offset))?;
            state.handle.read_exact(&mut buffer)?;
        }
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let state = self.state.get_mut();
        let offset = state.len;
        if !data.is_empty() {
            state.handle.seek(SeekFrom::Start(offset))?;
            state.handle.write_all(data)?;
            state.len += data.len() as u64;
        }
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.state.get_mut().handle.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.state.get_mut().handle.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.state.lock().len)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let state = self.state.get_mut();
        if new_size > state.len {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size: state.len,
            });
        }
        state.handle.set_len(new_size)?;
        state.handle.sync_all()?;
        state.len = new_size;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let scratch = scratch_path(&self.path);
        let mut next = File::create(&scratch)?;
        next.write_all(data)?;
        next.sync_all()?;
        drop(next);

        fs::rename(&scratch, &self.path)?;
        *self.state.get_mut() = OpenFile::open(&self.path)?;
        Ok(())
    }
}
