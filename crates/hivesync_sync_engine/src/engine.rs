//! The sync cycle: PUSH unsynced local changes, then PULL remote ones.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use hivesync_core::chrono::{DateTime, Utc};
use hivesync_core::{ChangeLogEntry, CoreError, Entity, LocalStore, Transaction};
use hivesync_sync_protocol::codec::{self, RemoteChange};
use hivesync_sync_protocol::{PullRequest, PushRequest};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Coarse state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No cycle running; the last one succeeded or none ran yet.
    Idle,
    /// A cycle is running.
    Syncing,
    /// The last cycle failed.
    Error,
}

/// What subscribers of [`SyncEngine::subscribe_status`] see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatusSnapshot {
    /// Current state.
    pub status: SyncStatus,
    /// When the last cycle completed.
    pub last_sync: Option<DateTime<Utc>>,
    /// Whether the device is known to be offline.
    pub offline: bool,
}

/// Counters across the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that completed.
    pub cycles_completed: u64,
    /// Cycles that failed.
    pub cycles_failed: u64,
    /// Change-log entries acknowledged by the remote.
    pub entries_pushed: u64,
    /// Remote changes applied.
    pub changes_pulled: u64,
    /// Retries made by [`SyncEngine::sync_with_retry`].
    pub retries: u64,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

/// Outcome of a PUSH.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Changes sent, one per entity.
    pub changes: usize,
    /// Change-log entries marked synced.
    pub entries: usize,
}

/// Outcome of a PULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    /// Remote changes applied.
    pub applied: usize,
    /// Local rows put back over the remote batch.
    pub reapplied: usize,
    /// Cursor stored with the last page.
    pub cursor: String,
}

/// Outcome of a full cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// PUSH half.
    pub push: PushOutcome,
    /// PULL half.
    pub pull: PullOutcome,
    /// Wall time of the cycle.
    pub duration: Duration,
}

/// Drives sync cycles between a [`LocalStore`] and a remote.
///
/// At most one cycle runs at a time. A direct [`SyncEngine::sync`] while
/// another cycle is running fails with [`SyncError::AlreadyRunning`];
/// [`SyncEngine::sync_queued`] waits its turn instead.
pub struct SyncEngine<T: SyncTransport> {
    store: Arc<LocalStore>,
    transport: T,
    config: SyncConfig,
    cycle: Mutex<()>,
    status: watch::Sender<SyncStatusSnapshot>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl<T: SyncTransport> SyncEngine<T> {
    /// Creates an engine over `store`.
    pub fn new(store: Arc<LocalStore>, transport: T, config: SyncConfig) -> SyncResult<Self> {
        let last_sync = store.cursor()?.last_sync_at;
        let (status, _) = watch::channel(SyncStatusSnapshot {
            status: SyncStatus::Idle,
            last_sync,
            offline: false,
        });
        Ok(Self {
            store,
            transport,
            config,
            cycle: Mutex::new(()),
            status,
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        })
    }

    /// The local store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current status.
    pub fn status(&self) -> SyncStatusSnapshot {
        self.status.borrow().clone()
    }

    /// Subscribes to status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatusSnapshot> {
        self.status.subscribe()
    }

    /// Current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Records whether the device is offline.
    pub fn set_offline(&self, offline: bool) {
        self.status.send_if_modified(|snapshot| {
            let changed = snapshot.offline != offline;
            snapshot.offline = offline;
            changed
        });
    }

    /// Returns true while a cycle is running.
    pub fn is_running(&self) -> bool {
        self.cycle.try_lock().is_err()
    }

    /// Stops [`SyncEngine::sync_with_retry`] before its next attempt.
    ///
    /// A cycle already in flight runs to completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Runs one cycle now.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] without doing anything if a
    /// cycle is in progress. Other errors leave the change log and cursor
    /// as they were before the failing step.
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let _cycle = self.cycle.try_lock().map_err(|_| {
            debug!("sync requested while a cycle is running");
            SyncError::AlreadyRunning
        })?;
        self.run_cycle().await
    }

    /// Runs one cycle once any running cycle has finished.
    pub async fn sync_queued(&self) -> SyncResult<SyncReport> {
        let _cycle = self.cycle.lock().await;
        self.run_cycle().await
    }

    /// Runs cycles until one succeeds, a non-retryable error occurs, or
    /// the configured attempts are used up.
    pub async fn sync_with_retry(&self) -> SyncResult<SyncReport> {
        self.cancelled.store(false, Ordering::SeqCst);
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = retry.delay_for_attempt(attempt);
                debug!(attempt, ?delay, "waiting before retry");
                tokio::time::sleep(delay).await;
                self.stats.write().retries += 1;
            }
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(SyncError::Cancelled);
            }

            match self.sync().await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                    warn!(attempt, error = %e, "sync attempt failed, will retry");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs the PUSH step alone.
    pub async fn push(&self) -> SyncResult<PushOutcome> {
        let _cycle = self.cycle.try_lock().map_err(|_| SyncError::AlreadyRunning)?;
        self.push_unsynced().await
    }

    /// Runs the PULL step alone.
    pub async fn pull(&self) -> SyncResult<PullOutcome> {
        let _cycle = self.cycle.try_lock().map_err(|_| SyncError::AlreadyRunning)?;
        self.pull_remote().await
    }

    // Callers hold the cycle lock.
    async fn run_cycle(&self) -> SyncResult<SyncReport> {
        let start = Instant::now();
        self.set_status(SyncStatus::Syncing);
        info!("sync cycle started");

        match self.push_then_pull().await {
            Ok((push, pull)) => {
                let now = Utc::now();
                if let Err(e) = self.record_last_sync(now) {
                    self.record_failure(&e);
                    return Err(e);
                }
                let report = SyncReport {
                    push,
                    pull,
                    duration: start.elapsed(),
                };
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.entries_pushed += report.push.entries as u64;
                    stats.changes_pulled += report.pull.applied as u64;
                    stats.last_error = None;
                }
                self.status.send_modify(|s| {
                    s.status = SyncStatus::Idle;
                    s.last_sync = Some(now);
                });
                info!(
                    pushed = report.push.changes,
                    pulled = report.pull.applied,
                    cursor = %report.pull.cursor,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "sync cycle completed"
                );
                Ok(report)
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    async fn push_then_pull(&self) -> SyncResult<(PushOutcome, PullOutcome)> {
        let push = self.push_unsynced().await?;
        let pull = self.pull_remote().await?;
        Ok((push, pull))
    }

    async fn push_unsynced(&self) -> SyncResult<PushOutcome> {
        let unsynced = self.store.list_unsynced()?;
        if unsynced.is_empty() {
            debug!("nothing to push");
            return Ok(PushOutcome::default());
        }

        // One change per entity, in order of first appearance, carrying the
        // first entry's operation and the row as it stands now.
        let mut seen = HashSet::new();
        let firsts: Vec<&ChangeLogEntry> = unsynced
            .iter()
            .filter(|entry| seen.insert(entry.entity_id))
            .collect();

        let mut changes = Vec::with_capacity(firsts.len());
        for entry in firsts {
            let current = self.store.get_including_tombstones(&entry.entity_id)?;
            if entry.operation.carries_payload() && current.is_none() {
                return Err(CoreError::EntityNotFound(entry.entity_id).into());
            }
            changes.push(codec::encode_push_change(entry, current.as_ref()));
        }

        let request = PushRequest::new(changes);
        debug!(
            changes = request.changes.len(),
            entries = unsynced.len(),
            key = %request.idempotency_key,
            "pushing"
        );
        self.call(self.transport.push(&request)).await?;

        let ids: Vec<_> = unsynced.iter().map(|entry| entry.id).collect();
        self.store.mark_synced(&ids)?;
        info!(
            changes = request.changes.len(),
            entries = ids.len(),
            "push acknowledged"
        );
        Ok(PushOutcome {
            changes: request.changes.len(),
            entries: ids.len(),
        })
    }

    // Pages until the remote has nothing more: an empty page, or a cursor
    // that did not move. Each page commits together with its cursor.
    async fn pull_remote(&self) -> SyncResult<PullOutcome> {
        let mut request = PullRequest::from_cursor(&self.store.cursor()?);
        let mut total = PullOutcome {
            applied: 0,
            reapplied: 0,
            cursor: request.cursor.clone(),
        };
        loop {
            let page = self.pull_page(&request).await?;
            total.applied += page.applied;
            total.reapplied += page.reapplied;
            total.cursor = page.cursor;
            if page.applied == 0 || total.cursor == request.cursor {
                return Ok(total);
            }
            debug!(cursor = %total.cursor, "page applied, pulling the next one");
            request = PullRequest {
                cursor: total.cursor.clone(),
            };
        }
    }

    async fn pull_page(&self, request: &PullRequest) -> SyncResult<PullOutcome> {
        let response = self.call(self.transport.pull(request)).await?;

        let remote = codec::decode_batch(&response.changes)?;
        if remote.is_empty() && response.cursor == request.cursor {
            debug!(cursor = %response.cursor, "nothing to pull");
            return Ok(PullOutcome {
                applied: 0,
                reapplied: 0,
                cursor: response.cursor,
            });
        }

        let reapply = self.config.conflict_policy.reapplies_local();
        let reapplied = self.store.transaction(|txn| {
            let touched: HashSet<_> = remote.iter().map(RemoteChange::entity_id).collect();
            let local: Vec<Entity> = if reapply {
                txn.unsynced_entity_ids()
                    .into_iter()
                    .filter(|id| touched.contains(id))
                    .filter_map(|id| txn.get_including_tombstones(&id).cloned())
                    .collect()
            } else {
                Vec::new()
            };

            for change in &remote {
                apply_remote(txn, change)?;
            }
            for row in &local {
                txn.put(row.clone());
            }

            let advanced = txn.cursor().advanced_to(response.cursor.clone());
            txn.set_cursor(advanced);
            Ok(local.len())
        })?;

        info!(
            applied = remote.len(),
            reapplied,
            cursor = %response.cursor,
            "pull applied"
        );
        Ok(PullOutcome {
            applied: remote.len(),
            reapplied,
            cursor: response.cursor,
        })
    }

    async fn call<F, R>(&self, request: F) -> SyncResult<R>
    where
        F: Future<Output = SyncResult<R>>,
    {
        tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| SyncError::Timeout)?
    }

    fn record_last_sync(&self, at: DateTime<Utc>) -> SyncResult<()> {
        self.store.transaction(|txn| {
            let stamped = txn.cursor().synced_at(at);
            txn.set_cursor(stamped);
            Ok(())
        })?;
        Ok(())
    }

    fn set_status(&self, status: SyncStatus) {
        self.status.send_modify(|s| s.status = status);
    }

    fn record_failure(&self, error: &SyncError) {
        warn!(error = %error, retryable = error.is_retryable(), "sync cycle failed");
        {
            let mut stats = self.stats.write();
            stats.cycles_failed += 1;
            stats.last_error = Some(error.to_string());
        }
        self.set_status(SyncStatus::Error);
    }
}

fn apply_remote(txn: &mut Transaction<'_>, change: &RemoteChange) -> Result<(), CoreError> {
    match change {
        RemoteChange::Upsert(entity) => txn.put(entity.clone()),
        RemoteChange::Delete { kind, id, at } => {
            if txn.get_including_tombstones(id).is_some() {
                txn.soft_delete(id, *at)?;
            } else {
                txn.put(Entity::tombstone(*id, *kind, *at));
            }
        }
    }
    Ok(())
}
