//! CLI command implementations.

pub mod changes;
pub mod checkpoint;
pub mod inspect;
pub mod status;
pub mod sync;
pub mod whoami;

use hivesync_core::{Config, LocalStore};
use std::path::Path;

/// Opens an existing store. Commands never create one.
pub(crate) fn open_existing(path: &Path) -> Result<LocalStore, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let config = Config::new().create_if_missing(false);
    Ok(LocalStore::open_with_config(path, config)?)
}
