//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store for the local journal.
///
/// Backends never interpret what they hold. The journal layered on top
/// owns framing, checksums and recovery.
///
/// # Invariants
///
/// - `append` returns the offset where the bytes begin
/// - `read_at` returns exactly the bytes previously written at that offset
/// - after `sync` returns, appended bytes survive process termination
/// - `replace` is all-or-nothing: readers see either the old or the new image
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails when the range extends past the current size or on I/O failure.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Makes all appended data and metadata durable.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the storage back to `new_size` bytes.
    ///
    /// Used to drop a torn tail left behind by a crash mid-append.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically swaps the entire contents for `data`.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Reads everything currently stored.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "storage larger than addressable memory",
            )
        })?;
        self.read_at(0, len)
    }
}
