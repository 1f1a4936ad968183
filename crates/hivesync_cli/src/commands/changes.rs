//! Changes command implementation.

use super::open_existing;
use hivesync_core::ChangeLogEntry;
use serde::Serialize;
use std::path::Path;

/// One change-log entry as printed.
#[derive(Debug, Serialize)]
pub struct ChangeRow {
    /// Insertion sequence.
    pub sequence: u64,
    /// Entity kind wire name.
    pub entity: String,
    /// Entity id.
    pub id: String,
    /// Operation name.
    pub operation: String,
    /// Time of the mutation, RFC 3339.
    pub timestamp: String,
    /// Whether the remote has acknowledged it.
    pub synced: bool,
}

impl From<&ChangeLogEntry> for ChangeRow {
    fn from(entry: &ChangeLogEntry) -> Self {
        Self {
            sequence: entry.sequence,
            entity: entry.kind.wire_name().to_string(),
            id: entry.entity_id.to_string(),
            operation: entry.operation.as_str().to_string(),
            timestamp: entry.timestamp.to_rfc3339(),
            synced: entry.synced,
        }
    }
}

/// Runs the changes command.
pub fn run(
    path: &Path,
    unsynced_only: bool,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let entries = if unsynced_only {
        store.list_unsynced()?
    } else {
        store.changes()?
    };
    store.close()?;

    let rows: Vec<ChangeRow> = entries
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(ChangeRow::from)
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            for row in &rows {
                println!(
                    "{:>6}  {:<8} {:<14} {}  {}  {}",
                    row.sequence,
                    row.operation,
                    row.entity,
                    row.id,
                    row.timestamp,
                    if row.synced { "synced" } else { "pending" }
                );
            }
            println!("{} entries", rows.len());
        }
    }
    Ok(())
}
