//! Push-notification events fanned out to dashboard listeners.
//!
//! Every event serialises to a tagged JSON object with an RFC3339
//! timestamp, ready to forward over whatever push channel the embedding
//! process exposes.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// End-of-run statistics attached to stop/complete events.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RunStats {
    pub processed_count: u64,
    pub failed_count: u64,
    pub duration_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum QueueEvent {
    Started {
        timestamp: DateTime<Utc>,
        spreadsheet_id: String,
    },
    Paused {
        timestamp: DateTime<Utc>,
    },
    Resumed {
        timestamp: DateTime<Utc>,
    },
    Stopped {
        timestamp: DateTime<Utc>,
        stats: RunStats,
    },
    Completed {
        timestamp: DateTime<Utc>,
        stats: RunStats,
    },
    Processing {
        timestamp: DateTime<Utc>,
        row_number: u32,
        title: String,
    },
    ItemCompleted {
        timestamp: DateTime<Utc>,
        row_number: u32,
        title: String,
        listing_url: String,
    },
    ItemFailed {
        timestamp: DateTime<Utc>,
        row_number: u32,
        title: String,
        error: String,
    },
    Error {
        timestamp: DateTime<Utc>,
        error: String,
    },
}

impl QueueEvent {
    /// The event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::Started { .. } => "started",
            QueueEvent::Paused { .. } => "paused",
            QueueEvent::Resumed { .. } => "resumed",
            QueueEvent::Stopped { .. } => "stopped",
            QueueEvent::Completed { .. } => "completed",
            QueueEvent::Processing { .. } => "processing",
            QueueEvent::ItemCompleted { .. } => "item-completed",
            QueueEvent::ItemFailed { .. } => "item-failed",
            QueueEvent::Error { .. } => "error",
        }
    }
}
