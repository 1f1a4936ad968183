//! # hivesync sync protocol
//!
//! Types exchanged with the remote and the codec between them and local
//! entities.
//!
//! - [`PushRequest`]: `POST /sync/push` body with its idempotency key
//! - [`PullResponse`]: `GET /sync/pull?cursor=` body
//! - [`WireChange`]: one change in either direction
//! - [`codec`]: entity payloads as JSON objects with ISO-8601 dates
//! - [`ConflictPolicy`]: what a pull does to rows with unpushed local edits
//!
//! This crate performs no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod codec;
mod conflict;
mod error;
mod messages;

pub use conflict::ConflictPolicy;
pub use error::{ProtocolError, ProtocolResult};
pub use hivesync_core::{Operation, START_CURSOR};
pub use messages::{IdempotencyKey, PullRequest, PullResponse, PushAck, PushRequest, WireChange};
