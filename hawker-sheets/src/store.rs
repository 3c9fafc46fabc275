//! The gateway trait and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use hawker_common::{HawkerError, Result};
use tokio::sync::RwLock;

use crate::row::{parse_row, ListingRow, RowStatus};

/// Async gateway to the row store. Writes are last-write-wins; the error
/// log is the only append-only column.
#[async_trait::async_trait]
pub trait RowStore: Send + Sync {
    /// Data rows whose status is `Process` or `Ready`, in sheet order.
    async fn pending_rows(&self) -> Result<Vec<ListingRow>>;

    /// Fetch a single row by sheet position.
    async fn row(&self, row_number: u32) -> Result<Option<ListingRow>>;

    /// Overwrite the status cell, and the listing URL cell when provided.
    async fn update_status(
        &self,
        row_number: u32,
        status: RowStatus,
        listing_url: Option<String>,
    ) -> Result<()>;

    /// Append a timestamped entry to the error log cell, preserving any
    /// existing content.
    async fn append_error(&self, row_number: u32, message: &str) -> Result<()>;
}

/// RwLock-backed sheet used by tests and dry runs. Row numbers follow sheet
/// convention: the header is row 1, data starts at row 2.
#[derive(Default)]
pub struct MemorySheet {
    rows: RwLock<BTreeMap<u32, ListingRow>>,
}

impl MemorySheet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed from pre-built rows (keyed by their own row numbers).
    pub fn with_rows(rows: Vec<ListingRow>) -> Arc<Self> {
        let map = rows.into_iter().map(|r| (r.row_number, r)).collect();
        Arc::new(Self {
            rows: RwLock::new(map),
        })
    }

    /// Seed from raw cell records in sheet order, assigning row numbers
    /// from 2 upward (row 1 being the header).
    pub fn from_records(records: Vec<Vec<String>>) -> Arc<Self> {
        let map = records
            .into_iter()
            .enumerate()
            .map(|(i, cells)| {
                let row_number = i as u32 + 2;
                (row_number, parse_row(&cells, row_number))
            })
            .collect();
        Arc::new(Self {
            rows: RwLock::new(map),
        })
    }

    /// Snapshot of every row, in sheet order.
    pub async fn all_rows(&self) -> Vec<ListingRow> {
        self.rows.read().await.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl RowStore for MemorySheet {
    async fn pending_rows(&self) -> Result<Vec<ListingRow>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|r| r.status.is_pending())
            .cloned()
            .collect())
    }

    async fn row(&self, row_number: u32) -> Result<Option<ListingRow>> {
        Ok(self.rows.read().await.get(&row_number).cloned())
    }

    async fn update_status(
        &self,
        row_number: u32,
        status: RowStatus,
        listing_url: Option<String>,
    ) -> Result<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&row_number)
            .ok_or_else(|| HawkerError::Store(format!("no such row: {row_number}")))?;
        tracing::debug!(target: "sheets", row_number, status = %status, "update_status");
        row.status = status;
        if let Some(url) = listing_url {
            row.listing_url = Some(url);
        }
        Ok(())
    }

    async fn append_error(&self, row_number: u32, message: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&row_number)
            .ok_or_else(|| HawkerError::Store(format!("no such row: {row_number}")))?;
        let entry = format!("{}: {}", Utc::now().to_rfc3339(), message);
        if row.error_log.is_empty() {
            row.error_log = entry;
        } else {
            row.error_log.push('\n');
            row.error_log.push_str(&entry);
        }
        tracing::debug!(target: "sheets", row_number, message, "append_error");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, status: &str) -> Vec<String> {
        vec![
            name.to_string(),
            "desc".into(),
            "10".into(),
            "Misc".into(),
            "Used".into(),
            "".into(),
            "Springfield".into(),
            status.to_string(),
            "".into(),
            "".into(),
        ]
    }

    #[tokio::test]
    async fn pending_rows_filters_by_status() {
        let sheet = MemorySheet::from_records(vec![
            record("a", "Process"),
            record("b", "Completed"),
            record("c", "Ready"),
            record("d", "Processing"),
        ]);
        let pending = sheet.pending_rows().await.unwrap();
        let names: Vec<_> = pending.iter().map(|r| r.item_name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        // Sheet numbering: header row offsets data to row 2.
        assert_eq!(pending[0].row_number, 2);
        assert_eq!(pending[1].row_number, 4);
    }

    #[tokio::test]
    async fn update_status_overwrites_and_sets_url() {
        let sheet = MemorySheet::from_records(vec![record("a", "Process")]);
        sheet
            .update_status(
                2,
                RowStatus::Completed,
                Some("https://market.example.com/item/1".into()),
            )
            .await
            .unwrap();
        let row = sheet.row(2).await.unwrap().unwrap();
        assert_eq!(row.status, RowStatus::Completed);
        assert_eq!(
            row.listing_url.as_deref(),
            Some("https://market.example.com/item/1")
        );
    }

    #[tokio::test]
    async fn update_status_without_url_keeps_existing_url() {
        let sheet = MemorySheet::from_records(vec![record("a", "Process")]);
        sheet
            .update_status(2, RowStatus::Completed, Some("https://x".into()))
            .await
            .unwrap();
        sheet
            .update_status(2, RowStatus::Failed, None)
            .await
            .unwrap();
        let row = sheet.row(2).await.unwrap().unwrap();
        assert_eq!(row.listing_url.as_deref(), Some("https://x"));
    }

    #[tokio::test]
    async fn append_error_preserves_previous_entries() {
        let sheet = MemorySheet::from_records(vec![record("a", "Process")]);
        sheet.append_error(2, "first failure").await.unwrap();
        sheet.append_error(2, "second failure").await.unwrap();
        let row = sheet.row(2).await.unwrap().unwrap();
        let lines: Vec<_> = row.error_log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("first failure"));
        assert!(lines[1].contains("second failure"));
    }

    #[tokio::test]
    async fn writes_to_missing_rows_error() {
        let sheet = MemorySheet::new();
        let err = sheet
            .update_status(9, RowStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such row"));
    }
}
