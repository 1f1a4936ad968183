//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use hivesync_sync_protocol::{IdempotencyKey, PullRequest, PullResponse, PushRequest, WireChange};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A sync transport carries push and pull calls to the remote.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process, mock for testing).
pub trait SyncTransport: Send + Sync {
    /// Sends a batch of local changes. Any 2xx answer is success.
    fn push(&self, request: &PushRequest) -> impl Future<Output = SyncResult<()>> + Send;

    /// Fetches remote changes after `request.cursor`.
    fn pull(&self, request: &PullRequest) -> impl Future<Output = SyncResult<PullResponse>> + Send;
}

/// A scripted transport for testing.
///
/// Pushes are deduplicated by idempotency key the way a real remote does
/// it, so tests can count effects. Pull responses are served from a queue;
/// with an empty queue a pull returns no changes and echoes the cursor.
#[derive(Debug, Default)]
pub struct MockTransport {
    unreachable: AtomicBool,
    delay: Mutex<Duration>,
    push_failure: Mutex<Option<u16>>,
    pull_failure: Mutex<Option<u16>>,
    pushes: Mutex<Vec<PushRequest>>,
    seen_keys: Mutex<HashSet<IdempotencyKey>>,
    applied: Mutex<Vec<WireChange>>,
    pulls: Mutex<Vec<PullRequest>>,
    pull_queue: Mutex<VecDeque<PullResponse>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a pull response.
    pub fn queue_pull(&self, response: PullResponse) {
        self.pull_queue.lock().push_back(response);
    }

    /// Makes the next push answer with `status`.
    pub fn fail_next_push(&self, status: u16) {
        *self.push_failure.lock() = Some(status);
    }

    /// Makes the next pull answer with `status`.
    pub fn fail_next_pull(&self, status: u16) {
        *self.pull_failure.lock() = Some(status);
    }

    /// Simulates a dropped connection.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delays every answer by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Every push request received, failed ones included.
    pub fn pushes(&self) -> Vec<PushRequest> {
        self.pushes.lock().clone()
    }

    /// Changes that took effect, counted once per idempotency key.
    pub fn applied_changes(&self) -> Vec<WireChange> {
        self.applied.lock().clone()
    }

    /// Every pull request received.
    pub fn pulls(&self) -> Vec<PullRequest> {
        self.pulls.lock().clone()
    }

    async fn answer(&self) -> SyncResult<()> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("connection refused"));
        }
        Ok(())
    }
}

impl SyncTransport for MockTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<()> {
        self.pushes.lock().push(request.clone());
        self.answer().await?;

        let failure = self.push_failure.lock().take();
        if let Some(status) = failure {
            return Err(SyncError::RemoteStatus { status });
        }

        let first_delivery = self.seen_keys.lock().insert(request.idempotency_key.clone());
        if first_delivery {
            self.applied.lock().extend(request.changes.iter().cloned());
        }
        Ok(())
    }

    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pulls.lock().push(request.clone());
        self.answer().await?;

        let failure = self.pull_failure.lock().take();
        if let Some(status) = failure {
            return Err(SyncError::RemoteStatus { status });
        }

        let queued = self.pull_queue.lock().pop_front();
        Ok(queued.unwrap_or_else(|| PullResponse {
            changes: Vec::new(),
            cursor: request.cursor.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivesync_sync_protocol::Operation;

    fn change(id: &str) -> WireChange {
        WireChange {
            entity: "volk".into(),
            id: id.into(),
            operation: Operation::Delete,
            data: None,
            timestamp: "2024-05-01T10:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn repeated_key_has_no_effect() {
        let transport = MockTransport::new();
        let request = PushRequest::new(vec![change("a"), change("b")]);

        transport.push(&request).await.unwrap();
        transport.push(&request).await.unwrap();

        assert_eq!(transport.pushes().len(), 2);
        assert_eq!(transport.applied_changes().len(), 2);
    }

    #[tokio::test]
    async fn injected_failure_applies_nothing() {
        let transport = MockTransport::new();
        transport.fail_next_push(500);

        let request = PushRequest::new(vec![change("a")]);
        let err = transport.push(&request).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteStatus { status: 500 }));
        assert!(transport.applied_changes().is_empty());

        transport.push(&request).await.unwrap();
        assert_eq!(transport.applied_changes().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_is_retryable() {
        let transport = MockTransport::new();
        transport.set_unreachable(true);
        let err = transport
            .pull(&PullRequest { cursor: "0".into() })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn empty_queue_echoes_cursor() {
        let transport = MockTransport::new();
        transport.queue_pull(PullResponse {
            changes: vec![change("a")],
            cursor: "1".into(),
        });

        let first = transport.pull(&PullRequest { cursor: "0".into() }).await.unwrap();
        assert_eq!(first.cursor, "1");
        let second = transport.pull(&PullRequest { cursor: "1".into() }).await.unwrap();
        assert!(second.changes.is_empty());
        assert_eq!(second.cursor, "1");
        assert_eq!(transport.pulls().len(), 2);
    }
}
