//! Inspect command implementation.

use super::open_existing;
use hivesync_core::{Entity, EntityKind};
use hivesync_sync_protocol::codec;
use std::path::Path;

/// Runs the inspect command.
pub fn run(
    path: &Path,
    kind: &str,
    include_deleted: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind: EntityKind = kind.parse()?;
    let store = open_existing(path)?;
    let rows = if include_deleted {
        store.query_with_tombstones(kind, |_| true)?
    } else {
        store.query(kind, |_| true)?
    };
    store.close()?;

    match format {
        "json" => {
            let payloads: Vec<_> = rows.iter().map(codec::entity_to_payload).collect();
            println!("{}", serde_json::to_string_pretty(&payloads)?);
        }
        _ => {
            for row in &rows {
                print_row(row);
            }
            println!("{} {} entities", rows.len(), kind);
        }
    }
    Ok(())
}

fn print_row(entity: &Entity) {
    let state = if entity.is_live() { "" } else { " (deleted)" };
    println!("{}{}", entity.id, state);
    println!("  updated {}", codec::format_timestamp(&entity.updated_at));
    for (name, value) in &entity.fields {
        println!("  {name}: {value:?}");
    }
}
