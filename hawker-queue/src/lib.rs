//! The queue loop: polls the row store for pending listings and pushes
//! them, one at a time, through the hybrid driver.
//!
//! Exactly one logical worker exists. Control commands (start/pause/
//! resume/stop) flip idempotent booleans observed cooperatively at the top
//! of each iteration; an in-flight row always runs to completion. State is
//! owned by the loop and published as read-only snapshots over a watch
//! channel; progress events fan out to listeners over a broadcast channel.

pub mod events;
pub mod runner;
pub mod state;

pub use events::{QueueEvent, RunStats};
pub use runner::{ListingQueue, QueuePacing};
pub use state::{AutomationState, CurrentItem};
