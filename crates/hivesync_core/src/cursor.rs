//! The persisted sync cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cursor value meaning "from the beginning of the remote stream".
pub const START_CURSOR: &str = "0";

/// Position in the remote change stream plus the time of the last good sync.
///
/// Only a successful PULL moves `cursor`. It is committed in the same
/// journal record as the batch it acknowledges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Opaque token echoed back to the remote. `None` before the first pull.
    pub cursor: Option<String>,
    /// When the last full sync cycle completed.
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl SyncCursor {
    /// Returns the token to send on the next pull.
    #[must_use]
    pub fn position(&self) -> &str {
        self.cursor.as_deref().unwrap_or(START_CURSOR)
    }

    /// Returns true if no pull has ever been applied.
    #[must_use]
    pub fn is_at_start(&self) -> bool {
        self.position() == START_CURSOR
    }

    /// Returns a copy advanced to `cursor`.
    #[must_use]
    pub fn advanced_to(&self, cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            last_sync_at: self.last_sync_at,
        }
    }

    /// Returns a copy with `last_sync_at` set.
    #[must_use]
    pub fn synced_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            cursor: self.cursor.clone(),
            last_sync_at: Some(at),
        }
    }
}
