use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use hawker_drivers::selectors::SelectorBook;
use hawker_queue::QueueEvent;
use hawker_sheets::MemorySheet;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Built-in selector chains unless an override file is given.
pub fn load_selector_book(path: Option<&Path>) -> Result<SelectorBook> {
    let Some(path) = path else {
        return Ok(SelectorBook::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read selector file {}", path.display()))?;
    let book: SelectorBook =
        serde_yaml::from_str(&raw).context("selector file is not valid YAML")?;
    info!(path = %path.display(), "selector overrides loaded");
    Ok(book)
}

/// Seed the in-memory sheet from a JSON fixture: an array of rows, each an
/// array of cells in column order (row numbers are assigned from 2 up).
pub fn load_store(path: &Path) -> Result<Arc<MemorySheet>> {
    if !path.exists() {
        warn!(path = %path.display(), "no row fixture found, starting with an empty sheet");
        return Ok(MemorySheet::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read row fixture {}", path.display()))?;
    let records: Vec<Vec<String>> =
        serde_json::from_str(&raw).context("row fixture is not a JSON array of cell arrays")?;
    info!(path = %path.display(), rows = records.len(), "row fixture loaded");
    Ok(MemorySheet::from_records(records))
}

/// Forward queue events into the structured log; an embedding process can
/// tail these or subscribe directly for its own push channel.
pub fn spawn_event_logger(mut rx: broadcast::Receiver<QueueEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(payload) => {
                        info!(target: "events", name = event.name(), %payload, "event")
                    }
                    Err(e) => warn!(target: "events", error = %e, "event serialisation failed"),
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(target: "events", missed, "event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
