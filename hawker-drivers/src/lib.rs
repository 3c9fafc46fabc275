//! Driver layer for marketplace listing automation.
//!
//! Two drivers share one contract: [`remote::RemoteDriver`] runs against a
//! browser cloud session with broad selector-guessing heuristics and a
//! challenge handler for interstitial screens, while
//! [`direct::DirectDriver`] runs a locally launched headless browser with
//! fixed selectors and cookie-based session reuse. The
//! [`hybrid::HybridDriver`] prefers Remote and downgrades to Direct, once
//! and irreversibly, on failure.
//!
//! - [`ListingDriver`]: the shared driver contract
//! - [`browser`]: fantoccini client/page/element helpers
//! - [`selectors`]: ordered locator chains, overridable without code changes
//! - [`challenge`]: bounded post-login challenge state machine
//! - [`images`]: the image pipeline port consumed before uploads

use std::path::PathBuf;

use hawker_common::{Credentials, DriverMode, ListingData, ListingResult, Result};

pub mod browser;
pub mod challenge;
pub mod cloud;
pub mod direct;
pub mod factory;
pub mod hybrid;
pub mod images;
pub mod remote;
pub mod selectors;
pub mod urls;

/// A component capable of performing the listing workflow against the
/// target website. Both drivers and the hybrid wrapper speak this.
#[async_trait::async_trait]
pub trait ListingDriver: Send {
    /// Which mode this driver represents.
    fn mode(&self) -> DriverMode;

    /// Authenticate the session. A remote driver that cannot confirm the
    /// login heuristically returns
    /// [`hawker_common::HawkerError::ManualIntervention`] with a live debug
    /// URL rather than guessing.
    async fn login(&mut self, creds: &Credentials) -> Result<()>;

    /// Bring the session to the marketplace create-listing surface.
    async fn navigate_to_marketplace(&mut self) -> Result<()>;

    /// Fill and submit one listing. Per-listing failures come back inside
    /// the [`ListingResult`]; only session-level faults are `Err`.
    async fn create_listing(&mut self, data: &ListingData) -> Result<ListingResult>;

    /// Capture a labelled full-page screenshot into the log directory.
    async fn screenshot(&mut self, label: &str) -> Result<PathBuf>;

    /// Tear the session down, best-effort.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Constructs concrete drivers. The hybrid orchestrator only sees this
/// seam, which keeps its downgrade policy testable without a browser.
#[async_trait::async_trait]
pub trait DriverFactory: Send + Sync {
    async fn connect_remote(&self) -> Result<Box<dyn ListingDriver>>;
    async fn connect_direct(&self) -> Result<Box<dyn ListingDriver>>;
}

/// Knobs shared by both drivers.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub headless: bool,
    /// Local WebDriver endpoint (chromedriver) for the direct driver.
    pub webdriver_url: String,
    /// Where the direct driver persists session cookies.
    pub cookies_path: PathBuf,
    /// Settle delay after clicks that trigger page transitions.
    pub settle_ms: u64,
    /// Attempt budget for the post-login challenge handler.
    pub challenge_attempts: u32,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            headless: true,
            webdriver_url: "http://localhost:9515".into(),
            cookies_path: PathBuf::from("marketplace-cookies.json"),
            settle_ms: 3000,
            challenge_attempts: 5,
        }
    }
}

/// Remote browser cloud account settings.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub api_base: String,
    pub api_key: String,
    pub project_id: String,
}
