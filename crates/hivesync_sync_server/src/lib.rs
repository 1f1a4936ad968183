//! # hivesync sync server
//!
//! An in-memory remote speaking the hivesync push/pull protocol. Used by the
//! engine's integration tests and as a reference for what a real backend
//! must guarantee:
//!
//! - a push is stored at most once per idempotency key
//! - every stored change gets a strictly increasing numeric cursor
//! - a pull returns the changes after the given cursor, oldest first
//!
//! Transport (HTTP routing, TLS, auth) is left to the embedding service.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod oplog;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use oplog::{AppendOutcome, ServerOplog};
pub use server::SyncServer;
