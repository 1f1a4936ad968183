//! # hivesync storage
//!
//! Opaque byte stores underneath the hivesync journal.
//!
//! A backend knows nothing about journal framing, entities or the change
//! log. It appends bytes, reads them back, and can atomically swap its
//! whole contents for a compacted image.
//!
//! - [`InMemoryBackend`] for tests and ephemeral stores
//! - [`FileBackend`] for on-device persistence
//!
//! ```rust
//! use hivesync_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"commit").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"commit");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
