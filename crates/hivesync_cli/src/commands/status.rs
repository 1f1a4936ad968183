//! Status command implementation.

use super::open_existing;
use serde::Serialize;
use std::path::Path;

/// Store status.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Store path.
    pub path: String,
    /// Device id stamped on local changes.
    pub device_id: String,
    /// Cursor sent on the next pull.
    pub cursor: String,
    /// When the last cycle completed, RFC 3339.
    pub last_sync: Option<String>,
    /// Change-log entries awaiting upload.
    pub unsynced: usize,
    /// All change-log entries, acknowledged or not.
    pub changes: usize,
    /// Journal size in bytes.
    pub journal_size: u64,
}

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let cursor = store.cursor()?;
    let report = StatusReport {
        path: path.display().to_string(),
        device_id: store.device_id().to_string(),
        cursor: cursor.position().to_string(),
        last_sync: cursor.last_sync_at.map(|at| at.to_rfc3339()),
        unsynced: store.list_unsynced()?.len(),
        changes: store.changes()?.len(),
        journal_size: store.journal_size()?,
    };
    store.close()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &StatusReport) {
    println!("Store:        {}", report.path);
    println!("Device:       {}", report.device_id);
    println!("Cursor:       {}", report.cursor);
    println!(
        "Last sync:    {}",
        report.last_sync.as_deref().unwrap_or("never")
    );
    println!("Pending:      {} of {} changes", report.unsynced, report.changes);
    println!("Journal size: {} bytes", report.journal_size);
}
