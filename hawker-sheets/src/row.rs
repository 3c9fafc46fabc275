//! Row schema for the listing sheet.
//!
//! Column order is fixed (A..J): Item Name, Description, Price, Category,
//! Condition, Photos, Location, Status, Listing URL, Error Log. Row 1 is
//! the header; data rows are 1-based row numbers from 2 upward.

use hawker_common::ListingData;
use serde::{Deserialize, Serialize};

/// Headers the sheet must carry, in column order.
pub const EXPECTED_HEADERS: [&str; 10] = [
    "Item Name",
    "Description",
    "Price",
    "Category",
    "Condition",
    "Photos",
    "Location",
    "Status",
    "Listing URL",
    "Error Log",
];

/// Status cell lifecycle. Parsing is lossless: anything unrecognised is
/// carried through [`RowStatus::Other`] so a write-back never mangles a
/// cell a human typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    Pending,
    Ready,
    Process,
    Processing,
    Completed,
    Failed,
    Error(String),
    Other(String),
}

impl RowStatus {
    /// Only `Process` and `Ready` mark a row as ready for the queue.
    pub fn is_pending(&self) -> bool {
        matches!(self, RowStatus::Process | RowStatus::Ready)
    }

    pub fn parse(cell: &str) -> RowStatus {
        match cell.trim() {
            "" | "Pending" => RowStatus::Pending,
            "Ready" => RowStatus::Ready,
            "Process" => RowStatus::Process,
            "Processing" => RowStatus::Processing,
            "Completed" | "Success" => RowStatus::Completed,
            "Failed" => RowStatus::Failed,
            s => {
                if let Some(msg) = s.strip_prefix("Error:") {
                    RowStatus::Error(msg.trim().to_string())
                } else {
                    RowStatus::Other(s.to_string())
                }
            }
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowStatus::Pending => write!(f, "Pending"),
            RowStatus::Ready => write!(f, "Ready"),
            RowStatus::Process => write!(f, "Process"),
            RowStatus::Processing => write!(f, "Processing"),
            RowStatus::Completed => write!(f, "Completed"),
            RowStatus::Failed => write!(f, "Failed"),
            RowStatus::Error(msg) => write!(f, "Error: {msg}"),
            RowStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One spreadsheet record representing a listing to be created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRow {
    /// 1-based sheet position. Row 1 is the header, so 0 and 1 are invalid
    /// for data rows.
    pub row_number: u32,
    pub item_name: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub condition: String,
    pub photos: Vec<String>,
    pub location: String,
    pub status: RowStatus,
    pub listing_url: Option<String>,
    /// Append-only; entries are newline-separated and timestamped.
    pub error_log: String,
}

impl ListingRow {
    /// A data row needs a resolvable position below the header to be
    /// addressable for write-back.
    pub fn has_valid_row_number(&self) -> bool {
        self.row_number >= 2
    }

    /// Build the form payload handed to a driver.
    pub fn to_listing_data(&self) -> ListingData {
        ListingData {
            title: self.item_name.clone(),
            description: self.description.clone(),
            price: self.price.clone(),
            category: self.category.clone(),
            condition: self.condition.clone(),
            photos: self.photos.clone(),
            location: self.location.clone(),
        }
    }
}

fn cell(cells: &[String], idx: usize) -> &str {
    cells.get(idx).map(String::as_str).unwrap_or("")
}

/// Map raw cells onto the 10-column schema. Short rows read as empty cells;
/// the photos cell is split on commas with empties dropped.
pub fn parse_row(cells: &[String], row_number: u32) -> ListingRow {
    let photos = cell(cells, 5)
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let listing_url = match cell(cells, 8).trim() {
        "" => None,
        url => Some(url.to_string()),
    };

    ListingRow {
        row_number,
        item_name: cell(cells, 0).to_string(),
        description: cell(cells, 1).to_string(),
        price: cell(cells, 2).to_string(),
        category: cell(cells, 3).to_string(),
        condition: cell(cells, 4).to_string(),
        photos,
        location: cell(cells, 6).to_string(),
        status: RowStatus::parse(cell(cells, 7)),
        listing_url,
        error_log: cell(cells, 9).to_string(),
    }
}

/// Case-insensitive containment check per column, matching how loosely the
/// sheet template tends to be copied around.
pub fn validate_headers(headers: &[String]) -> bool {
    EXPECTED_HEADERS.iter().enumerate().all(|(i, expected)| {
        headers
            .get(i)
            .map(|h| h.to_lowercase().contains(&expected.to_lowercase()))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn status_parse_display_round_trips() {
        for s in ["Pending", "Ready", "Process", "Processing", "Completed", "Failed"] {
            assert_eq!(RowStatus::parse(s).to_string(), s);
        }
        assert_eq!(
            RowStatus::parse("Error: no submit button"),
            RowStatus::Error("no submit button".into())
        );
        assert_eq!(
            RowStatus::parse("Error: x").to_string(),
            "Error: x"
        );
        // Unknown cells survive a round trip untouched.
        assert_eq!(RowStatus::parse("on hold").to_string(), "on hold");
    }

    #[test]
    fn only_process_and_ready_are_pending() {
        assert!(RowStatus::Process.is_pending());
        assert!(RowStatus::Ready.is_pending());
        for s in [
            RowStatus::Pending,
            RowStatus::Processing,
            RowStatus::Completed,
            RowStatus::Failed,
            RowStatus::Error("x".into()),
            RowStatus::Other("on hold".into()),
        ] {
            assert!(!s.is_pending(), "{s} must not be pending");
        }
    }

    #[test]
    fn parses_full_row() {
        let row = parse_row(
            &cells(&[
                "Desk",
                "Oak desk, minor scratches",
                "50",
                "Furniture",
                "Used - Good",
                "desk1.jpg, desk2.jpg,,",
                "Springfield",
                "Process",
                "",
                "",
            ]),
            5,
        );
        assert_eq!(row.row_number, 5);
        assert_eq!(row.item_name, "Desk");
        assert_eq!(row.photos, vec!["desk1.jpg", "desk2.jpg"]);
        assert_eq!(row.status, RowStatus::Process);
        assert!(row.listing_url.is_none());
        assert!(row.has_valid_row_number());
    }

    #[test]
    fn short_rows_read_as_empty_cells() {
        let row = parse_row(&cells(&["Lamp"]), 2);
        assert_eq!(row.item_name, "Lamp");
        assert_eq!(row.price, "");
        assert!(row.photos.is_empty());
        assert_eq!(row.status, RowStatus::Pending);
    }

    #[test]
    fn listing_data_carries_all_fields() {
        let row = parse_row(
            &cells(&[
                "Desk", "desc", "50", "Furniture", "Good", "a.jpg", "Springfield", "Ready", "", "",
            ]),
            3,
        );
        let data = row.to_listing_data();
        assert_eq!(data.title, "Desk");
        assert_eq!(data.price, "50");
        assert_eq!(data.photos, vec!["a.jpg"]);
    }

    #[test]
    fn header_validation_is_case_insensitive_containment() {
        let good: Vec<String> = EXPECTED_HEADERS.iter().map(|s| s.to_uppercase()).collect();
        assert!(validate_headers(&good));

        let decorated: Vec<String> = EXPECTED_HEADERS
            .iter()
            .map(|s| format!("{s} (required)"))
            .collect();
        assert!(validate_headers(&decorated));

        let mut bad = good;
        bad[7] = "State".into();
        assert!(!validate_headers(&bad));
        assert!(!validate_headers(&["Item Name".to_string()]));
    }
}
