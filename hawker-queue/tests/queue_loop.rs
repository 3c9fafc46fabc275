//! End-to-end exercises of the queue loop against an in-memory sheet and
//! scripted drivers. No browser anywhere; the driver factory hands back
//! stand-ins that settle instantly (or block on a gate where a test needs
//! to hold the loop mid-flight).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hawker_common::{Credentials, DriverMode, HawkerError, ListingData, ListingResult};
use hawker_drivers::{DriverFactory, ListingDriver};
use hawker_queue::{ListingQueue, QueueEvent, QueuePacing};
use hawker_sheets::{parse_row, ListingRow, MemorySheet, RowStatus, RowStore};
use tokio::sync::broadcast;
use tokio::sync::Semaphore;

fn creds() -> Credentials {
    Credentials {
        email: "seller@example.com".into(),
        password: "pw".into(),
    }
}

fn fast_pacing() -> QueuePacing {
    QueuePacing {
        delay_min: Duration::from_millis(1),
        delay_max: Duration::from_millis(2),
        pause_poll: Duration::from_millis(5),
    }
}

fn row(row_number: u32, name: &str, status: &str) -> ListingRow {
    let cells: Vec<String> = [
        name,
        "a fine item",
        "50",
        "Furniture",
        "Used - Good",
        "",
        "Springfield",
        status,
        "",
        "",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    parse_row(&cells, row_number)
}

/// Test driver: always "direct", optionally failing or gated.
struct TestDriver {
    behavior: Arc<Behavior>,
}

#[derive(Default)]
struct Behavior {
    fail_create: AtomicBool,
    creates: AtomicUsize,
    gate: Option<Semaphore>,
}

#[async_trait::async_trait]
impl ListingDriver for TestDriver {
    fn mode(&self) -> DriverMode {
        DriverMode::Direct
    }

    async fn login(&mut self, _creds: &Credentials) -> hawker_common::Result<()> {
        Ok(())
    }

    async fn navigate_to_marketplace(&mut self) -> hawker_common::Result<()> {
        Ok(())
    }

    async fn create_listing(
        &mut self,
        data: &ListingData,
    ) -> hawker_common::Result<ListingResult> {
        if let Some(gate) = &self.behavior.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.behavior.creates.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_create.load(Ordering::SeqCst) {
            Err(HawkerError::ListingCreation {
                mode: DriverMode::Direct,
                message: format!("publish button missing for '{}'", data.title),
            })
        } else {
            Ok(ListingResult::ok(
                DriverMode::Direct,
                "https://www.facebook.com/marketplace/item/42",
            ))
        }
    }

    async fn screenshot(&mut self, _label: &str) -> hawker_common::Result<PathBuf> {
        Ok(PathBuf::from("/dev/null"))
    }

    async fn close(self: Box<Self>) -> hawker_common::Result<()> {
        Ok(())
    }
}

/// Remote is always down so every row exercises the fallback path and ends
/// up on the direct test driver.
struct TestFactory {
    behavior: Arc<Behavior>,
}

impl TestFactory {
    fn new() -> (Arc<Self>, Arc<Behavior>) {
        let behavior = Arc::new(Behavior::default());
        (
            Arc::new(Self {
                behavior: behavior.clone(),
            }),
            behavior,
        )
    }

    fn gated(permits: usize) -> (Arc<Self>, Arc<Behavior>) {
        let behavior = Arc::new(Behavior {
            gate: Some(Semaphore::new(permits)),
            ..Default::default()
        });
        (
            Arc::new(Self {
                behavior: behavior.clone(),
            }),
            behavior,
        )
    }
}

#[async_trait::async_trait]
impl DriverFactory for TestFactory {
    async fn connect_remote(&self) -> hawker_common::Result<Box<dyn ListingDriver>> {
        Err(HawkerError::Initialization("remote cloud unreachable".into()))
    }

    async fn connect_direct(&self) -> hawker_common::Result<Box<dyn ListingDriver>> {
        Ok(Box::new(TestDriver {
            behavior: self.behavior.clone(),
        }))
    }
}

async fn next_event(rx: &mut broadcast::Receiver<QueueEvent>) -> QueueEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn drain_names(rx: &mut broadcast::Receiver<QueueEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    names
}

#[tokio::test]
async fn zero_pending_completes_with_empty_stats() {
    let sheet = MemorySheet::new();
    let (factory, _) = TestFactory::new();
    let mut queue = ListingQueue::new(sheet, factory, creds(), fast_pacing());
    let mut rx = queue.subscribe();

    queue.start("sheet-1");
    queue.join().await;

    let state = queue.status();
    assert!(!state.is_running);
    assert_eq!(state.processed_count, 0);
    assert_eq!(state.failed_count, 0);

    let names = drain_names(&mut rx);
    assert_eq!(names, vec!["started", "completed"]);
}

#[tokio::test]
async fn successful_row_is_completed_with_url() {
    let sheet = MemorySheet::with_rows(vec![row(5, "Desk", "Process")]);
    let (factory, behavior) = TestFactory::new();
    let mut queue =
        ListingQueue::new(sheet.clone(), factory, creds(), fast_pacing());
    let mut rx = queue.subscribe();

    queue.start("sheet-1");
    queue.join().await;

    let updated = sheet.row(5).await.unwrap().unwrap();
    assert_eq!(updated.status, RowStatus::Completed);
    assert_eq!(
        updated.listing_url.as_deref(),
        Some("https://www.facebook.com/marketplace/item/42")
    );
    assert!(updated.error_log.is_empty());

    let state = queue.status();
    assert_eq!(state.processed_count, 1);
    assert_eq!(state.failed_count, 0);
    assert_eq!(behavior.creates.load(Ordering::SeqCst), 1);

    let names = drain_names(&mut rx);
    assert_eq!(
        names,
        vec!["started", "processing", "item-completed", "completed"]
    );
}

#[tokio::test]
async fn failed_row_appends_error_and_continues() {
    let mut failing = row(2, "Desk", "Process");
    failing.error_log = "2026-01-01T00:00:00Z: earlier failure".to_string();
    let sheet = MemorySheet::with_rows(vec![failing, row(3, "Lamp", "Ready")]);
    let (factory, behavior) = TestFactory::new();
    behavior.fail_create.store(true, Ordering::SeqCst);

    let mut queue =
        ListingQueue::new(sheet.clone(), factory, creds(), fast_pacing());
    queue.start("sheet-1");
    queue.join().await;

    let desk = sheet.row(2).await.unwrap().unwrap();
    assert_eq!(desk.status, RowStatus::Failed);
    // The old entry survives; the new one is appended after it.
    let lines: Vec<_> = desk.error_log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("earlier failure"));
    assert!(lines[1].contains("publish button missing"));

    let state = queue.status();
    assert_eq!(state.processed_count, 0);
    assert_eq!(state.failed_count, 2);

    // One failure never aborts the batch: both rows were attempted.
    assert_eq!(behavior.creates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rows_without_resolvable_numbers_are_skipped() {
    // Row number 1 collides with the header and cannot be written back.
    let sheet = MemorySheet::with_rows(vec![row(1, "Orphan", "Process")]);
    let (factory, behavior) = TestFactory::new();
    let mut queue =
        ListingQueue::new(sheet.clone(), factory, creds(), fast_pacing());
    queue.start("sheet-1");
    queue.join().await;

    let state = queue.status();
    assert!(!state.is_running);
    assert_eq!(state.processed_count, 0);
    assert_eq!(state.failed_count, 0);
    assert_eq!(behavior.creates.load(Ordering::SeqCst), 0);

    // The row was never touched.
    let orphan = sheet.row(1).await.unwrap().unwrap();
    assert_eq!(orphan.status, RowStatus::Process);
}

#[tokio::test]
async fn process_once_without_pending_rows_does_not_start() {
    let sheet = MemorySheet::with_rows(vec![row(2, "Desk", "Completed")]);
    let (factory, _) = TestFactory::new();
    let mut queue = ListingQueue::new(sheet, factory, creds(), fast_pacing());
    let mut rx = queue.subscribe();

    let state = queue.process_once("sheet-1").await.unwrap();
    assert!(!state.is_running);
    assert!(drain_names(&mut rx).is_empty());
}

#[tokio::test]
async fn pause_is_idempotent_and_resume_mirrors_it() {
    let sheet = MemorySheet::with_rows(vec![row(2, "Desk", "Process")]);
    let (factory, behavior) = TestFactory::gated(0);
    let mut queue =
        ListingQueue::new(sheet, factory, creds(), fast_pacing());
    let mut rx = queue.subscribe();

    queue.start("sheet-1");
    assert_eq!(next_event(&mut rx).await.name(), "started");
    assert_eq!(next_event(&mut rx).await.name(), "processing");

    // The driver is gated, so the loop is demonstrably mid-row here.
    queue.pause();
    queue.pause();
    let state = queue.pause();
    assert!(state.is_paused);

    // Release the driver and resume; the loop drains and completes.
    behavior.gate.as_ref().unwrap().add_permits(1);
    queue.resume();
    queue.resume();
    queue.join().await;

    let names = drain_names(&mut rx);
    assert_eq!(names.iter().filter(|n| **n == "paused").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "resumed").count(), 1);
    assert!(names.contains(&"completed"));
}

#[tokio::test]
async fn stop_is_observed_between_rows() {
    let sheet = MemorySheet::with_rows(vec![row(2, "Desk", "Process"), row(3, "Lamp", "Process")]);
    let (factory, behavior) = TestFactory::new();
    let pacing = QueuePacing {
        delay_min: Duration::from_millis(300),
        delay_max: Duration::from_millis(300),
        pause_poll: Duration::from_millis(5),
    };
    let mut queue = ListingQueue::new(sheet.clone(), factory, creds(), pacing);
    let mut rx = queue.subscribe();

    queue.start("sheet-1");
    loop {
        if next_event(&mut rx).await.name() == "item-completed" {
            break;
        }
    }
    // Stop lands inside the inter-row delay, before the next fetch.
    let state = queue.stop();
    assert!(!state.is_running);
    queue.join().await;

    // The second row was never dequeued.
    assert_eq!(behavior.creates.load(Ordering::SeqCst), 1);
    let lamp = sheet.row(3).await.unwrap().unwrap();
    assert_eq!(lamp.status, RowStatus::Process);

    let names = drain_names(&mut rx);
    assert_eq!(names.iter().filter(|n| **n == "stopped").count(), 1);
    assert!(!names.contains(&"completed"));
}

/// Store whose writes fail, to drive the loop-level error path.
struct BrokenStore {
    inner: Arc<MemorySheet>,
}

#[async_trait::async_trait]
impl RowStore for BrokenStore {
    async fn pending_rows(&self) -> hawker_common::Result<Vec<ListingRow>> {
        self.inner.pending_rows().await
    }

    async fn row(&self, row_number: u32) -> hawker_common::Result<Option<ListingRow>> {
        self.inner.row(row_number).await
    }

    async fn update_status(
        &self,
        _row_number: u32,
        _status: RowStatus,
        _listing_url: Option<String>,
    ) -> hawker_common::Result<()> {
        Err(HawkerError::Store("write quota exhausted".into()))
    }

    async fn append_error(&self, _row_number: u32, _message: &str) -> hawker_common::Result<()> {
        Err(HawkerError::Store("write quota exhausted".into()))
    }
}

#[tokio::test]
async fn store_failure_resets_loop_and_reports_error() {
    let inner = MemorySheet::with_rows(vec![row(2, "Desk", "Process")]);
    let store = Arc::new(BrokenStore { inner });
    let (factory, _) = TestFactory::new();
    let mut queue = ListingQueue::new(store, factory, creds(), fast_pacing());
    let mut rx = queue.subscribe();

    queue.start("sheet-1");
    queue.join().await;

    let state = queue.status();
    assert!(!state.is_running);
    assert!(!state.is_paused);

    // The Processing write-back is the first store touch, so the loop dies
    // before the processing event fires.
    let names = drain_names(&mut rx);
    assert_eq!(names, vec!["started", "error"]);
}

#[tokio::test]
async fn start_while_running_is_a_no_op() {
    let sheet = MemorySheet::with_rows(vec![row(2, "Desk", "Process")]);
    let (factory, behavior) = TestFactory::gated(0);
    let mut queue = ListingQueue::new(sheet, factory, creds(), fast_pacing());
    let mut rx = queue.subscribe();

    queue.start("sheet-1");
    assert_eq!(next_event(&mut rx).await.name(), "started");
    let state = queue.start("sheet-1");
    assert!(state.is_running);

    behavior.gate.as_ref().unwrap().add_permits(1);
    queue.join().await;

    let names = drain_names(&mut rx);
    assert!(!names.contains(&"started"), "no second started event");
}
