//! hivesync CLI
//!
//! Command-line tools for a device's local store.
//!
//! # Commands
//!
//! - `status` - Show cursor, last sync and pending changes
//! - `changes` - List the change log
//! - `sync` - Run one push/pull cycle against the remote
//! - `inspect` - Show entities of one kind
//! - `checkpoint` - Rewrite the journal as a snapshot
//! - `whoami` - Show the user the token belongs to

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// hivesync local store tools.
#[derive(Parser)]
#[command(name = "hivesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long, env = "HIVESYNC_STORE")]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cursor, last sync and pending changes
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the change log
    Changes {
        /// Only entries not yet acknowledged by the remote
        #[arg(short, long)]
        unsynced: bool,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run one push/pull cycle against the remote
    Sync {
        /// Remote base URL
        #[arg(long, env = "HIVESYNC_SERVER_URL", default_value = hivesync_sync_engine::DEFAULT_SERVER_URL)]
        server: String,

        /// Bearer token
        #[arg(long, env = "HIVESYNC_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// What happens to unsynced local edits when a pull touches them
        /// (reapply-local, remote-wins)
        #[arg(long, default_value = "reapply-local")]
        policy: String,

        /// Retry failed cycles up to this many attempts
        #[arg(long, default_value = "1")]
        attempts: u32,
    },

    /// Show entities of one kind
    Inspect {
        /// Wire name of the kind (volk, standort, durchsicht, ...)
        kind: String,

        /// Include tombstoned entities
        #[arg(short, long)]
        deleted: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Rewrite the journal as a snapshot
    Checkpoint {
        /// Drop acknowledged change-log entries first
        #[arg(short, long)]
        compact: bool,
    },

    /// Show the user the token belongs to
    Whoami {
        /// Remote base URL
        #[arg(long, env = "HIVESYNC_SERVER_URL", default_value = hivesync_sync_engine::DEFAULT_SERVER_URL)]
        server: String,

        /// Bearer token
        #[arg(long, env = "HIVESYNC_TOKEN", hide_env_values = true)]
        token: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status { format } => {
            let path = cli.store.ok_or("Store path required for status")?;
            commands::status::run(&path, &format)?;
        }
        Commands::Changes {
            unsynced,
            limit,
            format,
        } => {
            let path = cli.store.ok_or("Store path required for changes")?;
            commands::changes::run(&path, unsynced, limit, &format)?;
        }
        Commands::Sync {
            server,
            token,
            timeout,
            policy,
            attempts,
        } => {
            let path = cli.store.ok_or("Store path required for sync")?;
            let options = commands::sync::SyncOptions {
                server,
                token,
                timeout_secs: timeout,
                policy: policy.parse()?,
                attempts,
            };
            commands::sync::run(&path, options)?;
        }
        Commands::Inspect {
            kind,
            deleted,
            format,
        } => {
            let path = cli.store.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &kind, deleted, &format)?;
        }
        Commands::Checkpoint { compact } => {
            let path = cli.store.ok_or("Store path required for checkpoint")?;
            commands::checkpoint::run(&path, compact)?;
        }
        Commands::Whoami { server, token } => {
            commands::whoami::run(&server, &token)?;
        }
    }

    Ok(())
}
