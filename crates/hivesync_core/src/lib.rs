//! # hivesync core
//!
//! The device-local half of the hivesync engine.
//!
//! - [`EntityStore`]: last-writer-wins tables of domain entities with soft deletes
//! - [`ChangeLog`]: append-only ledger of local mutations awaiting upload
//! - [`SyncCursor`]: position in the remote change stream
//! - [`LocalStore`]: owns all three and persists them through one journal
//!
//! ## Atomicity
//!
//! A mutation and its change-log entry are written in one
//! [`LocalStore::transaction`], which is journaled as a single framed,
//! checksummed record. A sync cycle running concurrently observes either
//! both or neither.
//!
//! ## Recovery
//!
//! On open the journal is replayed. A record cut short by a crash is
//! discarded; a record that fails its checksum makes the open fail.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod changelog;
mod config;
mod cursor;
mod dir;
mod entity;
mod error;
mod journal;
mod queries;
mod state;
mod store;
mod transaction;
mod types;

pub use changelog::{ChangeLog, ChangeLogEntry};
pub use config::Config;
pub use cursor::{SyncCursor, START_CURSOR};
pub use entity::{Entity, EntityId, EntityKind, EntityStore, FieldValue};
pub use error::{CoreError, CoreResult};
pub use store::LocalStore;
pub use transaction::Transaction;
pub use types::{ChangeId, DeviceId, Operation};

// Re-exported so callers can build timestamps without a direct dependency.
pub use chrono;
