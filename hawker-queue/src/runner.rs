//! The queue loop itself plus its control surface.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hawker_common::{Credentials, HawkerError, Result};
use hawker_drivers::hybrid::HybridDriver;
use hawker_drivers::DriverFactory;
use hawker_sheets::{ListingRow, RowStatus, RowStore};
use rand::Rng;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::events::{QueueEvent, RunStats};
use crate::state::{AutomationState, CurrentItem};

const EVENT_CAPACITY: usize = 64;

/// Pacing knobs for the loop.
#[derive(Debug, Clone)]
pub struct QueuePacing {
    /// Randomized inter-row delay bounds.
    pub delay_min: Duration,
    pub delay_max: Duration,
    /// Poll interval while paused.
    pub pause_poll: Duration,
}

impl Default for QueuePacing {
    fn default() -> Self {
        Self {
            delay_min: Duration::from_secs(30),
            delay_max: Duration::from_secs(60),
            pause_poll: Duration::from_secs(5),
        }
    }
}

/// Control flags shared between commands and the loop. Commands and loop
/// transitions both write them; last write wins, which is safe because
/// every write is an idempotent boolean.
#[derive(Default)]
struct ControlFlags {
    running: AtomicBool,
    paused: AtomicBool,
}

/// The queue loop and its control surface. Each command returns the
/// current state snapshot.
pub struct ListingQueue {
    store: Arc<dyn RowStore>,
    factory: Arc<dyn DriverFactory>,
    credentials: Credentials,
    pacing: QueuePacing,
    flags: Arc<ControlFlags>,
    state: Arc<watch::Sender<AutomationState>>,
    state_rx: watch::Receiver<AutomationState>,
    events: broadcast::Sender<QueueEvent>,
    task: Option<JoinHandle<()>>,
}

impl ListingQueue {
    pub fn new(
        store: Arc<dyn RowStore>,
        factory: Arc<dyn DriverFactory>,
        credentials: Credentials,
        pacing: QueuePacing,
    ) -> Self {
        let (state, state_rx) = watch::channel(AutomationState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            factory,
            credentials,
            pacing,
            flags: Arc::new(ControlFlags::default()),
            state: Arc::new(state),
            state_rx,
            events,
            task: None,
        }
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Watch state snapshots as they change.
    pub fn watch_state(&self) -> watch::Receiver<AutomationState> {
        self.state_rx.clone()
    }

    /// Current snapshot.
    pub fn status(&self) -> AutomationState {
        self.state_rx.borrow().clone()
    }

    /// Start the loop. A no-op (returning the live snapshot) when already
    /// running.
    pub fn start(&mut self, spreadsheet_id: &str) -> AutomationState {
        if self.flags.running.swap(true, Ordering::SeqCst) {
            info!(target: "queue", "start ignored, already running");
            return self.status();
        }
        self.flags.paused.store(false, Ordering::SeqCst);
        self.state.send_modify(|s| s.begin_run());
        self.emit(QueueEvent::Started {
            timestamp: Utc::now(),
            spreadsheet_id: spreadsheet_id.to_string(),
        });
        info!(target: "queue", spreadsheet_id, "automation started");

        let worker = Worker {
            store: self.store.clone(),
            factory: self.factory.clone(),
            credentials: self.credentials.clone(),
            pacing: self.pacing.clone(),
            flags: self.flags.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
        };
        self.task = Some(tokio::spawn(worker.run()));
        self.status()
    }

    /// One-shot entry point: only starts the loop when pending rows exist.
    pub async fn process_once(&mut self, spreadsheet_id: &str) -> Result<AutomationState> {
        let pending = self.store.pending_rows().await?;
        if pending.is_empty() {
            info!(target: "queue", "no pending items to process");
            return Ok(self.status());
        }
        info!(target: "queue", pending = pending.len(), "processing pending items");
        Ok(self.start(spreadsheet_id))
    }

    /// Pause after the current row. Idempotent: repeated calls neither
    /// change state nor emit duplicate events.
    pub fn pause(&self) -> AutomationState {
        if self.flags.running.load(Ordering::SeqCst)
            && !self.flags.paused.swap(true, Ordering::SeqCst)
        {
            self.state.send_modify(|s| s.is_paused = true);
            self.emit(QueueEvent::Paused {
                timestamp: Utc::now(),
            });
            info!(target: "queue", "automation paused");
        }
        self.status()
    }

    pub fn resume(&self) -> AutomationState {
        if self.flags.running.load(Ordering::SeqCst)
            && self.flags.paused.swap(false, Ordering::SeqCst)
        {
            self.state.send_modify(|s| s.is_paused = false);
            self.emit(QueueEvent::Resumed {
                timestamp: Utc::now(),
            });
            info!(target: "queue", "automation resumed");
        }
        self.status()
    }

    /// Request a stop. Cooperative: the flag is observed at the top of the
    /// next iteration, so an in-flight row still completes.
    pub fn stop(&self) -> AutomationState {
        if self.flags.running.swap(false, Ordering::SeqCst) {
            self.flags.paused.store(false, Ordering::SeqCst);
            let stats = stats_of(&self.status());
            self.state.send_modify(|s| s.end_run());
            self.emit(QueueEvent::Stopped {
                timestamp: Utc::now(),
                stats,
            });
            info!(target: "queue", "automation stopped");
        }
        self.status()
    }

    /// Wait for the loop task to wind down (used by tests and shutdown).
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }
}

fn stats_of(state: &AutomationState) -> RunStats {
    RunStats {
        processed_count: state.processed_count,
        failed_count: state.failed_count,
        duration_secs: state.running_secs().unwrap_or(0),
    }
}

/// Everything the spawned loop task owns.
struct Worker {
    store: Arc<dyn RowStore>,
    factory: Arc<dyn DriverFactory>,
    credentials: Credentials,
    pacing: QueuePacing,
    flags: Arc<ControlFlags>,
    state: Arc<watch::Sender<AutomationState>>,
    events: broadcast::Sender<QueueEvent>,
}

impl Worker {
    async fn run(self) {
        if let Err(e) = self.run_inner().await {
            // Loop-level fault: reset to Idle and report. No auto-restart.
            error!(target: "queue", error = %e, "queue loop failed");
            self.flags.running.store(false, Ordering::SeqCst);
            self.flags.paused.store(false, Ordering::SeqCst);
            self.state.send_modify(|s| s.end_run());
            self.emit(QueueEvent::Error {
                timestamp: Utc::now(),
                error: e.to_string(),
            });
        }
    }

    async fn run_inner(&self) -> Result<()> {
        // Rows skipped this pass (bad row numbers); never retried until the
        // next run.
        let mut skipped: HashSet<u32> = HashSet::new();

        loop {
            if !self.flags.running.load(Ordering::SeqCst) {
                // Stop command already emitted the event and reset state.
                return Ok(());
            }
            if self.flags.paused.load(Ordering::SeqCst) {
                tokio::time::sleep(self.pacing.pause_poll).await;
                continue;
            }

            let mut pending = self.store.pending_rows().await?;
            pending.retain(|row| !skipped.contains(&row.row_number));

            let Some(row) = pending.into_iter().next() else {
                let stats = stats_of(&self.state.borrow());
                info!(
                    target: "queue",
                    processed = stats.processed_count,
                    failed = stats.failed_count,
                    "no more items to process"
                );
                self.flags.running.store(false, Ordering::SeqCst);
                self.state.send_modify(|s| s.end_run());
                self.emit(QueueEvent::Completed {
                    timestamp: Utc::now(),
                    stats,
                });
                return Ok(());
            };

            if !row.has_valid_row_number() {
                error!(
                    target: "queue",
                    row_number = row.row_number,
                    title = %row.item_name,
                    "row has no resolvable row number, skipping"
                );
                skipped.insert(row.row_number);
                continue;
            }

            self.process_row(&row).await?;

            self.state
                .send_modify(|s| s.last_processed_time = Some(Utc::now()));
            let delay = self.next_delay();
            info!(target: "queue", delay_ms = delay.as_millis() as u64, "waiting before next item");
            // FIXME: a stop landing here is only observed after the full
            // sleep; chunk the sleep against the running flag to cut stop
            // latency.
            tokio::time::sleep(delay).await;
        }
    }

    /// Push one row through a fresh hybrid driver and record the outcome.
    /// Driver failures are absorbed here; only store failures bubble up.
    async fn process_row(&self, row: &ListingRow) -> Result<()> {
        info!(target: "queue", row_number = row.row_number, title = %row.item_name, "processing item");
        self.state.send_modify(|s| {
            s.current_item = Some(CurrentItem {
                row_number: row.row_number,
                title: row.item_name.clone(),
            })
        });

        // Written back immediately so re-entrant triggers see the in-flight
        // state.
        self.store
            .update_status(row.row_number, RowStatus::Processing, None)
            .await?;
        self.emit(QueueEvent::Processing {
            timestamp: Utc::now(),
            row_number: row.row_number,
            title: row.item_name.clone(),
        });

        match self.run_driver(row).await {
            Ok(listing_url) => {
                self.store
                    .update_status(row.row_number, RowStatus::Completed, Some(listing_url.clone()))
                    .await?;
                self.state.send_modify(|s| {
                    s.processed_count += 1;
                    s.current_item = None;
                });
                self.emit(QueueEvent::ItemCompleted {
                    timestamp: Utc::now(),
                    row_number: row.row_number,
                    title: row.item_name.clone(),
                    listing_url,
                });
            }
            Err(e) => {
                let message = e.to_string();
                warn!(target: "queue", row_number = row.row_number, error = %message, "item failed");
                self.store
                    .update_status(row.row_number, RowStatus::Failed, None)
                    .await?;
                self.store.append_error(row.row_number, &message).await?;
                self.state.send_modify(|s| {
                    s.failed_count += 1;
                    s.current_item = None;
                });
                self.emit(QueueEvent::ItemFailed {
                    timestamp: Utc::now(),
                    row_number: row.row_number,
                    title: row.item_name.clone(),
                    error: message,
                });
            }
        }
        Ok(())
    }

    /// One full driver pass: initialize, login, navigate, create, close.
    async fn run_driver(&self, row: &ListingRow) -> Result<String> {
        let mut driver = HybridDriver::new(self.factory.clone());
        driver.initialize().await?;

        let outcome = async {
            driver.login(&self.credentials).await?;
            driver.navigate_to_marketplace().await?;
            driver.create_listing(&row.to_listing_data()).await
        }
        .await;
        driver.close().await;

        let result = outcome?;
        if result.success {
            result.listing_url.ok_or_else(|| {
                HawkerError::ListingCreation {
                    mode: result.method,
                    message: "driver reported success without a listing URL".into(),
                }
            })
        } else {
            Err(HawkerError::ListingCreation {
                mode: result.method,
                message: result.error.unwrap_or_else(|| "unknown error".into()),
            })
        }
    }

    fn next_delay(&self) -> Duration {
        let min = self.pacing.delay_min.min(self.pacing.delay_max);
        let max = self.pacing.delay_max.max(self.pacing.delay_min);
        if min == max {
            return min;
        }
        let span = (max - min).as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=span);
        min + Duration::from_millis(jitter)
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }
}
