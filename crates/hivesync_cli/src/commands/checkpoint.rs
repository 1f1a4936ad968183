//! Checkpoint command implementation.

use super::open_existing;
use std::path::Path;

/// Runs the checkpoint command.
pub fn run(path: &Path, compact: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let before = store.journal_size()?;

    if compact {
        let dropped = store.compact_synced()?;
        println!("Dropped {dropped} acknowledged changes");
    }
    store.checkpoint()?;

    let after = store.journal_size()?;
    store.close()?;
    println!("Journal: {before} -> {after} bytes");
    Ok(())
}
