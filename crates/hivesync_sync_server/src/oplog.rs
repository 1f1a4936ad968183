//! Server-side change log.

use hivesync_sync_protocol::{IdempotencyKey, WireChange};
use parking_lot::RwLock;
use std::collections::HashSet;

/// Outcome of appending a pushed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The batch was stored. Carries the number of changes.
    Appended(usize),
    /// The key was seen before; nothing was stored.
    Duplicate,
}

#[derive(Debug, Default)]
struct Inner {
    changes: Vec<(u64, WireChange)>,
    seen_keys: HashSet<IdempotencyKey>,
}

/// Every accepted change in acceptance order.
///
/// Each change gets the next sequence number, starting at 1. A pull
/// cursor is the sequence of the last change the client has seen, so `0`
/// means "everything".
#[derive(Debug, Default)]
pub struct ServerOplog {
    inner: RwLock<Inner>,
}

impl ServerOplog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a batch unless its key was already used.
    ///
    /// The key check and the append happen under one lock, so two
    /// deliveries of the same batch can never both be stored.
    pub fn append(&self, key: &IdempotencyKey, changes: Vec<WireChange>) -> AppendOutcome {
        let mut inner = self.inner.write();
        if !inner.seen_keys.insert(key.clone()) {
            return AppendOutcome::Duplicate;
        }
        let count = changes.len();
        let mut next = inner.changes.last().map_or(1, |(seq, _)| seq + 1);
        for change in changes {
            inner.changes.push((next, change));
            next += 1;
        }
        AppendOutcome::Appended(count)
    }

    /// Up to `limit` changes after `cursor`, with the cursor to send next.
    pub fn changes_since(&self, cursor: u64, limit: usize) -> (Vec<WireChange>, u64) {
        let inner = self.inner.read();
        let start = inner.changes.partition_point(|(seq, _)| *seq <= cursor);
        let batch: Vec<_> = inner.changes[start..].iter().take(limit).collect();
        let next = batch.last().map_or(cursor, |(seq, _)| *seq);
        (batch.into_iter().map(|(_, c)| c.clone()).collect(), next)
    }

    /// Sequence of the newest change, or 0.
    pub fn cursor(&self) -> u64 {
        self.inner.read().changes.last().map_or(0, |(seq, _)| *seq)
    }

    /// Number of stored changes.
    pub fn len(&self) -> usize {
        self.inner.read().changes.len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().changes.is_empty()
    }
}
