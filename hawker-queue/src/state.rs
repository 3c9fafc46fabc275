//! Loop-owned automation state, published as read-only snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The row currently being pushed through a driver.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CurrentItem {
    pub row_number: u32,
    pub title: String,
}

/// Snapshot of the queue loop. One instance per running process; the loop
/// is the only writer, everyone else reads via the watch channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutomationState {
    pub is_running: bool,
    pub is_paused: bool,
    pub current_item: Option<CurrentItem>,
    pub processed_count: u64,
    pub failed_count: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub last_processed_time: Option<DateTime<Utc>>,
}

impl AutomationState {
    /// Seconds since the run started, when one is active.
    pub fn running_secs(&self) -> Option<i64> {
        self.start_time
            .map(|start| (Utc::now() - start).num_seconds())
    }

    /// Reset for a new run.
    pub(crate) fn begin_run(&mut self) {
        self.is_running = true;
        self.is_paused = false;
        self.current_item = None;
        self.processed_count = 0;
        self.failed_count = 0;
        self.start_time = Some(Utc::now());
        self.last_processed_time = None;
    }

    /// Return to Idle, keeping the final counters visible for status calls.
    pub(crate) fn end_run(&mut self) {
        self.is_running = false;
        self.is_paused = false;
        self.current_item = None;
    }
}
