//! Spreadsheet gateway port: row schema, status lifecycle, and the
//! [`RowStore`] trait the queue loop consumes.
//!
//! The sheet is treated as a dumb key-value row store keyed by row number.
//! The concrete transport (Google Sheets REST, CSV, whatever) lives behind
//! [`RowStore`]; this crate ships the schema logic plus [`MemorySheet`], the
//! in-process implementation used by tests and dry runs.
//!
//! - [`ListingRow`]: one spreadsheet record (10 ordered columns, A..J)
//! - [`RowStatus`]: lossless status cell parse/display
//! - [`RowStore`]: async gateway trait
//! - [`MemorySheet`]: RwLock-backed table

pub mod row;
pub mod store;

pub use row::{parse_row, validate_headers, ListingRow, RowStatus, EXPECTED_HEADERS};
pub use store::{MemorySheet, RowStore};
