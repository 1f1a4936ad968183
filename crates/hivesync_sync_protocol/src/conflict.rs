//! Pull-time conflict policy.

use std::fmt;
use std::str::FromStr;

/// What a pull does to rows that still have unpushed local edits.
///
/// A remote change always overwrites the local row for its id. The policy
/// decides whether local intent is re-asserted afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Rows with unsynced change-log entries are restored to their local
    /// revision after the remote batch is applied, in the same commit. The
    /// next push then carries the local revision to the remote.
    #[default]
    ReapplyLocalUnsynced,
    /// The remote revision stays; unsynced entries remain queued and the
    /// next push sends whatever the row holds at that time.
    RemoteWins,
}

impl ConflictPolicy {
    /// Returns true if local unsynced rows survive a pull.
    #[must_use]
    pub fn reapplies_local(&self) -> bool {
        matches!(self, ConflictPolicy::ReapplyLocalUnsynced)
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictPolicy::ReapplyLocalUnsynced => "reapply-local",
            ConflictPolicy::RemoteWins => "remote-wins",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reapply-local" => Ok(ConflictPolicy::ReapplyLocalUnsynced),
            "remote-wins" => Ok(ConflictPolicy::RemoteWins),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}
