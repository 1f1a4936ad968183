//! Sync command implementation.

use super::open_existing;
use hivesync_sync_engine::{HttpTransport, RetryConfig, SyncConfig, SyncEngine, SyncReport};
use hivesync_sync_protocol::ConflictPolicy;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Remote base URL.
    pub server: String,
    /// Bearer token, if signed in.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Treatment of unsynced local edits on pull.
    pub policy: ConflictPolicy,
    /// Total attempts, at least one.
    pub attempts: u32,
}

impl SyncOptions {
    fn to_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(self.server.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_conflict_policy(self.policy)
            .with_retry(RetryConfig::new(self.attempts.max(1)));
        if let Some(token) = &self.token {
            config = config.with_auth_token(token.clone());
        }
        config
    }
}

/// Runs the sync command.
pub fn run(path: &Path, options: SyncOptions) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(open_existing(path)?);
    let config = options.to_config();
    let transport = HttpTransport::new(&config)?;
    info!(server = %transport.base_url(), "syncing");
    let engine = SyncEngine::new(Arc::clone(&store), transport, config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(engine.sync_with_retry());
    store.close()?;

    let report = result?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!(
        "Pushed {} changes ({} log entries)",
        report.push.changes, report.push.entries
    );
    println!(
        "Pulled {} changes, kept {} local edits",
        report.pull.applied, report.pull.reapplied
    );
    println!("Cursor: {}", report.pull.cursor);
    println!("Took {} ms", report.duration.as_millis());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_map_onto_config() {
        let options = SyncOptions {
            server: "https://bees.example/".into(),
            token: Some("t0k".into()),
            timeout_secs: 5,
            policy: ConflictPolicy::RemoteWins,
            attempts: 0,
        };
        let config = options.to_config();

        assert_eq!(config.server_url, "https://bees.example");
        assert_eq!(config.auth_token.as_deref(), Some("t0k"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.conflict_policy, ConflictPolicy::RemoteWins);
        assert_eq!(config.retry.max_attempts, 1);
    }
}
