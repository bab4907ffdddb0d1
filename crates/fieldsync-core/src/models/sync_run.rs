//! Sync run history model

use serde::{Deserialize, Serialize};

/// One completed drain attempt, kept for status displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    /// History row identifier (0 until stored)
    pub id: i64,
    /// Drain start (Unix ms)
    pub started_at: i64,
    /// Drain end (Unix ms)
    pub finished_at: i64,
    /// Actions acknowledged and removed
    pub synced: i64,
    /// Actions moved to the dead-letter state
    pub dead_lettered: i64,
    /// Failure that halted the drain, if any
    pub error: Option<String>,
}

impl SyncRun {
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Queue counters for status displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub dead_letter: u64,
    /// Enqueue time of the oldest pending action (Unix ms)
    pub oldest_pending_at: Option<i64>,
}
