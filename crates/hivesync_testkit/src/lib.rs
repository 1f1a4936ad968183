//! # hivesync testkit
//!
//! Test utilities shared by the hivesync crates.
//!
//! - [`fixtures`]: throwaway stores and pre-populated apiaries
//! - [`generators`]: proptest strategies for entities and field values
//! - [`wire`]: builders for the changes a remote would send
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hivesync_testkit::prelude::*;
//!
//! #[test]
//! fn creates_a_colony() {
//!     with_temp_store(|store| {
//!         store.create(colony("Volk 1")).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod wire;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::wire::*;
}

pub use fixtures::*;
pub use generators::*;
pub use wire::*;
