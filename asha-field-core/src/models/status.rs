use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synchronization state of a record.
///
/// Transitions are owned by the sync engine (and the manual reset of a
/// failed record); see [`SyncStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
    #[default]
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl SyncStatus {
    /// Returns true if `self -> next` is an edge of the transition table.
    ///
    /// | from    | to      |
    /// |---------|---------|
    /// | PENDING | SYNCING |
    /// | SYNCING | SYNCED  |
    /// | SYNCING | PENDING |
    /// | SYNCING | FAILED  |
    /// | FAILED  | PENDING |
    pub fn can_transition_to(self, next: SyncStatus) -> bool {
        use SyncStatus::*;
        matches!(
            (self, next),
            (Pending, Syncing)
                | (Syncing, Synced)
                | (Syncing, Pending)
                | (Syncing, Failed)
                | (Failed, Pending)
        )
    }

    /// Statuses a sync pass picks up.
    pub fn is_syncable(self) -> bool {
        matches!(self, SyncStatus::Pending)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "PENDING"),
            SyncStatus::Syncing => write!(f, "SYNCING"),
            SyncStatus::Synced => write!(f, "SYNCED"),
            SyncStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(SyncStatus::Pending),
            "SYNCING" => Ok(SyncStatus::Syncing),
            "SYNCED" => Ok(SyncStatus::Synced),
            "FAILED" => Ok(SyncStatus::Failed),
            _ => Err(format!(
                "Invalid status '{}'. Valid options: pending, syncing, synced, failed",
                s
            )),
        }
    }
}
