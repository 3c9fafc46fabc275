//! Common types shared across Hawker crates.
//!
//! This crate defines the listing payload handed to drivers, the driver
//! mode selector, the shared error taxonomy, and the centralised logging
//! initialiser. It is intentionally lightweight so every crate can depend
//! on it without pulling in browser or HTTP machinery.
//!
//! # Overview
//!
//! - [`ListingData`]: the form payload a driver fills in
//! - [`ListingResult`]: the per-listing outcome folded back into a row
//! - [`DriverMode`] and its monotonic [`DriverMode::on_failure`] transition
//! - [`observability`]: tracing/logging initialisation
//! - [`HawkerError`] and [`Result`]: shared error handling
use serde::{Deserialize, Serialize};

pub mod observability;

/// Marketplace account credentials consumed by the drivers.
///
/// `Debug` is implemented by hand so the password can never leak into logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown: String = self.email.chars().take(3).collect();
        f.debug_struct("Credentials")
            .field("email", &format!("{shown}***"))
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Form payload for a single marketplace listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingData {
    pub title: String,
    pub description: String,
    /// Decimal string as entered in the sheet; the target site parses it.
    pub price: String,
    pub category: String,
    pub condition: String,
    /// Image references in upload order.
    pub photos: Vec<String>,
    pub location: String,
}

/// Which driver performed (or was supposed to perform) an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverMode {
    Remote,
    Direct,
}

impl DriverMode {
    /// Pure downgrade transition: Remote fails over to Direct; Direct is
    /// terminal. Never upgrades within a session.
    pub fn on_failure(self) -> DriverMode {
        match self {
            DriverMode::Remote => DriverMode::Direct,
            DriverMode::Direct => DriverMode::Direct,
        }
    }
}

impl std::fmt::Display for DriverMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverMode::Remote => write!(f, "remote"),
            DriverMode::Direct => write!(f, "direct"),
        }
    }
}

/// Outcome of one `create_listing` run. Transient; its fields are folded
/// into the spreadsheet row and then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingResult {
    pub success: bool,
    pub listing_url: Option<String>,
    pub error: Option<String>,
    pub method: DriverMode,
}

impl ListingResult {
    pub fn ok(method: DriverMode, listing_url: impl Into<String>) -> Self {
        Self {
            success: true,
            listing_url: Some(listing_url.into()),
            error: None,
            method,
        }
    }

    pub fn failed(method: DriverMode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            listing_url: None,
            error: Some(error.into()),
            method,
        }
    }
}

/// Error taxonomy shared across the Hawker system.
#[derive(thiserror::Error, Debug)]
pub enum HawkerError {
    /// Neither driver could be brought up. Fatal; no retries at this layer.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// Both drivers rejected the credentials or hit an unresolved challenge.
    #[error("authentication failed ({mode}): {message}")]
    Authentication { mode: DriverMode, message: String },

    /// The login heuristic could not confirm success; a human can take over
    /// at the referenced remote debug session.
    #[error("manual intervention required, debug session at {debug_url}")]
    ManualIntervention { debug_url: String },

    #[error("navigation failed ({mode}): {message}")]
    Navigation { mode: DriverMode, message: String },

    #[error("listing creation failed ({mode}): {message}")]
    ListingCreation { mode: DriverMode, message: String },

    /// A required form field resolved no selector in its chain.
    #[error("could not locate required field '{field}'")]
    FieldNotFound { field: &'static str },

    /// The spreadsheet gateway rejected a read or write.
    #[error("row store error: {0}")]
    Store(String),

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A driver (browser, network) reported an error.
    #[error("driver error: {0}")]
    Driver(#[from] anyhow::Error),
}

impl HawkerError {
    /// The driver mode a failure is attributed to, where one applies.
    pub fn mode(&self) -> Option<DriverMode> {
        match self {
            HawkerError::Authentication { mode, .. }
            | HawkerError::Navigation { mode, .. }
            | HawkerError::ListingCreation { mode, .. } => Some(*mode),
            _ => None,
        }
    }
}

/// Convenient alias for results that use [`HawkerError`].
pub type Result<T> = std::result::Result<T, HawkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downgrade_is_monotonic() {
        let mut mode = DriverMode::Remote;
        mode = mode.on_failure();
        assert_eq!(mode, DriverMode::Direct);
        // No sequence of further failures re-upgrades.
        for _ in 0..3 {
            mode = mode.on_failure();
            assert_eq!(mode, DriverMode::Direct);
        }
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials {
            email: "seller@example.com".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("sel***"));
    }

    #[test]
    fn error_carries_last_attempted_mode() {
        let err = HawkerError::ListingCreation {
            mode: DriverMode::Direct,
            message: "submit button missing".into(),
        };
        assert_eq!(err.mode(), Some(DriverMode::Direct));
        assert!(err.to_string().contains("direct"));
    }
}
