//! # hivesync sync engine
//!
//! Moves changes between a device's [`hivesync_core::LocalStore`] and the
//! remote.
//!
//! - [`SyncEngine`]: one cycle is PUSH then PULL, never two at once
//! - [`SyncTransport`]: the network seam, with [`HttpTransport`] and [`MockTransport`]
//! - [`SyncTrigger`]: starts a cycle when [`ConnectivityMonitor`] reports the
//!   device is back online
//! - [`Session`]: the signed-in user and the bearer token
//!
//! ## Cycle
//!
//! 1. PUSH the unsynced change log, one change per entity, under a fresh
//!    idempotency key. Entries are marked synced only after a 2xx.
//! 2. PULL from the stored cursor, page by page until the remote is caught
//!    up. Each page is decoded whole first, then applied together with its
//!    cursor in one local transaction.
//!
//! A failure at any step leaves the change log and cursor as they were, so
//! the next cycle resends and re-pulls from the same point.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod engine;
mod error;
mod http;
mod session;
mod transport;
mod trigger;

pub use config::{RetryConfig, SyncConfig, DEFAULT_SERVER_URL};
pub use engine::{PullOutcome, PushOutcome, SyncEngine, SyncReport, SyncStats, SyncStatus, SyncStatusSnapshot};
pub use error::{SyncError, SyncResult};
pub use http::{HttpAuthClient, HttpTransport};
pub use session::{AuthClient, AuthSession, AuthUser, Credentials, Session};
pub use transport::{MockTransport, SyncTransport};
pub use trigger::{Connectivity, ConnectivityMonitor, ConnectivityState, SyncTrigger};
