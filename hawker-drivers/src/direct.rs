//! Direct driver: a locally launched headless browser with fixed selectors.
//!
//! This is the fallback path, so it trades drift-tolerance for
//! determinism: exact selectors, explicit waits, and cookie-based session
//! reuse to keep interactive logins rare. Resource downloads are blocked
//! at launch to cut page weight (uploads still go out).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use fantoccini::cookies::Cookie;
use hawker_common::{Credentials, DriverMode, HawkerError, ListingData, ListingResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::browser::{Browser, Page};
use crate::images::ImagePipeline;
use crate::selectors::fixed;
use crate::urls;
use crate::{DriverSettings, ListingDriver};

const SELECTOR_WAIT: Duration = Duration::from_secs(15);
const UPLOAD_WAIT: Duration = Duration::from_secs(30);
const NAVIGATION_WAIT: Duration = Duration::from_secs(30);
const PUBLISH_WAIT: Duration = Duration::from_secs(60);

const LOGIN_ERROR_SELECTORS: [&str; 5] = [
    "[data-testid='royal_login_error']",
    ".login_error_box",
    "[role='alert']",
    "div[id*='error']",
    "div[data-testid='login_error']",
];

/// Cookie fields worth persisting between runs. Expiry is deliberately not
/// restored; a stale session fails verification and falls back to the form.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
    secure: Option<bool>,
    http_only: Option<bool>,
}

pub struct DirectDriver {
    browser: Browser,
    page: Page,
    settings: DriverSettings,
    images: Arc<dyn ImagePipeline>,
    logged_in: bool,
}

impl DirectDriver {
    /// Launch a session on the local WebDriver service.
    pub async fn connect(settings: DriverSettings, images: Arc<dyn ImagePipeline>) -> Result<Self> {
        info!(target: "direct", webdriver = %settings.webdriver_url, "launching local browser");
        let browser = Browser::launch_local(&settings).await?;
        let page = browser.page(settings.settle_ms);
        Ok(Self {
            browser,
            page,
            settings,
            images,
            logged_in: false,
        })
    }

    async fn perform_login(&mut self, creds: &Credentials) -> Result<()> {
        if creds.email.is_empty() || creds.password.is_empty() {
            return Err(anyhow!("marketplace credentials are missing"));
        }

        self.page.goto(urls::LOGIN_URL).await?;
        self.page.screenshot_checkpoint("login-start").await;

        if self.try_cookie_login().await {
            self.logged_in = true;
            return Ok(());
        }

        info!(target: "direct", "performing form login");
        self.page.goto(urls::LOGIN_URL).await?;

        let email = self.page.wait_for(fixed::EMAIL, SELECTOR_WAIT).await?;
        let password = self.page.wait_for(fixed::PASSWORD, SELECTOR_WAIT).await?;
        let button = self
            .page
            .wait_for(fixed::LOGIN_BUTTON, SELECTOR_WAIT)
            .await?;

        email.clear_and_type(&creds.email).await?;
        password.clear_and_type(&creds.password).await?;
        self.page.screenshot_checkpoint("before-login-click").await;

        button.click().await?;
        self.page.settle().await;
        self.page.screenshot_checkpoint("after-login").await;

        // Explicit error surfaces beat a silent verification miss.
        if let Some(message) = self.detect_login_error().await {
            return Err(anyhow!(message));
        }

        if self.check_login_status().await {
            info!(target: "direct", "form login succeeded");
            self.logged_in = true;
            if let Err(e) = self.save_cookies().await {
                warn!(target: "direct", error = %e, "failed to persist cookies");
            }
            Ok(())
        } else {
            Err(anyhow!("login failed: no logged-in indicators found"))
        }
    }

    /// Restore a persisted session if a cookie file exists and still
    /// verifies. Any failure falls through to the form login.
    async fn try_cookie_login(&mut self) -> bool {
        let path = self.settings.cookies_path.clone();
        let cookies = match load_cookies(&path) {
            Ok(Some(cookies)) => cookies,
            Ok(None) => return false,
            Err(e) => {
                warn!(target: "direct", error = %e, "cookie file unreadable, ignoring");
                return false;
            }
        };

        info!(target: "direct", count = cookies.len(), "attempting cookie login");
        for stored in cookies {
            let mut cookie = Cookie::new(stored.name, stored.value);
            if let Some(domain) = stored.domain {
                cookie.set_domain(domain);
            }
            if let Some(path) = stored.path {
                cookie.set_path(path);
            }
            if let Some(secure) = stored.secure {
                cookie.set_secure(secure);
            }
            if let Some(http_only) = stored.http_only {
                cookie.set_http_only(http_only);
            }
            if let Err(e) = self.browser.client.add_cookie(cookie).await {
                warn!(target: "direct", error = %e, "cookie rejected");
            }
        }

        if self.page.goto(urls::HOME_URL).await.is_err() {
            return false;
        }
        self.page.screenshot_checkpoint("cookie-login").await;

        if self.check_login_status().await {
            info!(target: "direct", "cookie login succeeded");
            true
        } else {
            info!(target: "direct", "cookie login failed, falling back to form");
            false
        }
    }

    async fn detect_login_error(&self) -> Option<String> {
        for selector in LOGIN_ERROR_SELECTORS {
            if let Some(element) = self.page.find(selector).await {
                let text = element.text().await.unwrap_or_default();
                return Some(format!("login error detected: {}", text.trim()));
            }
        }

        let url = self.page.current_url().await.ok()?;
        if url.contains(urls::CHECKPOINT_FRAGMENT) {
            return Some(
                "additional verification required (checkpoint); complete it manually and retry"
                    .to_string(),
            );
        }
        None
    }

    /// Logged-in detection: indicator scan first, URL shape as fallback.
    async fn check_login_status(&self) -> bool {
        for selector in fixed::LOGGED_IN {
            if self.page.find(selector).await.is_some() {
                info!(target: "direct", selector, "login detected");
                return true;
            }
        }

        let Ok(url) = self.page.current_url().await else {
            return false;
        };
        if url.contains("facebook.com") && !urls::looks_logged_out(&url) {
            // An error box on a logged-out page also passes the URL check.
            for selector in LOGIN_ERROR_SELECTORS {
                if self.page.find(selector).await.is_some() {
                    return false;
                }
            }
            info!(target: "direct", "login detected via URL check");
            return true;
        }
        false
    }

    async fn ensure_logged_in(&mut self) -> Result<()> {
        if self.logged_in {
            return Ok(());
        }
        if self.check_login_status().await {
            self.logged_in = true;
            return Ok(());
        }
        Err(anyhow!("not logged in"))
    }

    async fn perform_navigate(&mut self) -> Result<()> {
        self.page.goto(urls::MARKETPLACE_CREATE_URL).await?;

        if self
            .page
            .wait_for(fixed::CREATE_LISTING_MARKER, NAVIGATION_WAIT)
            .await
            .is_ok()
        {
            info!(target: "direct", "reached create-listing page");
            return Ok(());
        }

        info!(target: "direct", "direct navigation failed, trying the sell button");
        self.page.goto(urls::MARKETPLACE_URL).await?;
        self.page
            .wait_for(fixed::HOME_FEED_MARKER, NAVIGATION_WAIT)
            .await?;

        let sell = match self.page.find(fixed::SELL_LINK).await {
            Some(link) => link,
            None => self
                .page
                .find(fixed::SELL_LINK_ARIA)
                .await
                .ok_or_else(|| anyhow!("no create-listing or sell button on the marketplace"))?,
        };
        sell.click().await?;
        self.page
            .wait_for(fixed::CREATE_LISTING_MARKER, NAVIGATION_WAIT)
            .await?;
        info!(target: "direct", "reached create-listing page via sell button");
        Ok(())
    }

    async fn perform_create_listing(&mut self, data: &ListingData) -> Result<ListingResult> {
        info!(target: "direct", title = %data.title, "creating listing");
        self.ensure_logged_in().await?;
        self.perform_navigate().await?;

        let prepared = self.images.prepare(&data.photos).await?;
        if !prepared.is_empty() {
            self.upload_images(&prepared).await?;
        }

        self.fill_listing_form(data).await?;
        let listing_url = self.submit_listing().await?;

        info!(target: "direct", listing_url = %listing_url, "listing created");
        Ok(ListingResult::ok(DriverMode::Direct, listing_url))
    }

    async fn upload_images(&self, images: &[PathBuf]) -> Result<()> {
        info!(target: "direct", count = images.len(), "uploading images");
        let input = self
            .page
            .find(fixed::FILE_INPUT)
            .await
            .ok_or_else(|| anyhow!("file input not found"))?;

        let keys = images
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        input.send_keys(&keys).await?;

        self.page
            .wait_for(fixed::MEDIA_PREVIEW, UPLOAD_WAIT)
            .await
            .context("image upload never produced a preview")?;
        Ok(())
    }

    async fn fill_listing_form(&self, data: &ListingData) -> Result<()> {
        let title = self.page.wait_for(fixed::TITLE_INPUT, SELECTOR_WAIT).await?;
        title.clear_and_type(&data.title).await?;

        let price = self.page.wait_for(fixed::PRICE_INPUT, SELECTOR_WAIT).await?;
        price.clear_and_type(&data.price).await?;

        if !data.category.is_empty() {
            self.select_from_dropdown(fixed::CATEGORY_SELECTOR, "category", &data.category)
                .await;
        }
        if !data.condition.is_empty() {
            self.select_from_dropdown(fixed::CONDITION_SELECTOR, "condition", &data.condition)
                .await;
        }

        let description = self
            .page
            .wait_for(fixed::DESCRIPTION_INPUT, SELECTOR_WAIT)
            .await?;
        description.clear_and_type(&data.description).await?;

        if !data.location.is_empty() {
            self.set_location(&data.location).await;
        }
        Ok(())
    }

    /// Open a dropdown and pick the item whose text contains the requested
    /// value. No match keeps whatever the UI pre-selected; never fatal.
    async fn select_from_dropdown(&self, selector: &str, what: &str, wanted: &str) {
        let result: Result<bool> = async {
            let control = self
                .page
                .find(selector)
                .await
                .ok_or_else(|| anyhow!("{what} control not found"))?;
            control.click().await?;
            self.page.wait_for(fixed::DROPDOWN_MENU, SELECTOR_WAIT).await?;

            let needle = wanted.to_lowercase();
            for item in self.page.find_all(fixed::DROPDOWN_ITEMS).await? {
                let text = item.text().await.unwrap_or_default();
                if text.to_lowercase().contains(&needle) {
                    item.click().await?;
                    return Ok(true);
                }
            }
            Ok(false)
        }
        .await;

        match result {
            Ok(true) => info!(target: "direct", what, wanted, "option selected"),
            Ok(false) => warn!(target: "direct", what, wanted, "option not offered, using default"),
            Err(e) => warn!(target: "direct", what, error = %e, "selection failed, using default"),
        }
    }

    /// Type the location and take the first typeahead suggestion; never
    /// fatal, the account's default location stands otherwise.
    async fn set_location(&self, location: &str) {
        let result: Result<()> = async {
            let field = self
                .page
                .find(fixed::LOCATION_SELECTOR)
                .await
                .ok_or_else(|| anyhow!("location field not found"))?;
            field.clear_and_type(location).await?;

            let suggestion = self
                .page
                .wait_for(fixed::LOCATION_OPTION, SELECTOR_WAIT)
                .await?;
            suggestion.click().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(target: "direct", error = %e, "location not set, using default");
        }
    }

    /// Publish and pull the listing URL out of the success dialog. The
    /// dialog link is the only place the URL shows up; missing it degrades
    /// to the marketplace root.
    async fn submit_listing(&self) -> Result<String> {
        let publish = self
            .page
            .find(fixed::PUBLISH_BUTTON)
            .await
            .ok_or_else(|| anyhow!("publish button not found"))?;
        publish.click().await?;

        self.page
            .wait_for(fixed::SUCCESS_DIALOG, PUBLISH_WAIT)
            .await
            .context("publish confirmation never appeared")?;

        let listing_url = match self.page.find(fixed::SUCCESS_DIALOG_LINK).await {
            Some(link) => link
                .attr("href")
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| urls::MARKETPLACE_URL.to_string()),
            None => urls::MARKETPLACE_URL.to_string(),
        };
        Ok(listing_url)
    }

    async fn save_cookies(&self) -> Result<()> {
        let cookies = self.browser.client.get_all_cookies().await?;
        let stored: Vec<StoredCookie> = cookies
            .iter()
            .map(|c| StoredCookie {
                name: c.name().to_string(),
                value: c.value().to_string(),
                domain: c.domain().map(str::to_string),
                path: c.path().map(str::to_string),
                secure: c.secure(),
                http_only: c.http_only(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.settings.cookies_path, json).with_context(|| {
            format!(
                "failed to write cookies to {}",
                self.settings.cookies_path.display()
            )
        })?;
        info!(target: "direct", count = stored.len(), "cookies persisted");
        Ok(())
    }
}

fn load_cookies(path: &Path) -> Result<Option<Vec<StoredCookie>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read cookie file {}", path.display()))?;
    let cookies: Vec<StoredCookie> =
        serde_json::from_str(&raw).context("cookie file is not valid JSON")?;
    Ok(Some(cookies))
}

#[async_trait::async_trait]
impl ListingDriver for DirectDriver {
    fn mode(&self) -> DriverMode {
        DriverMode::Direct
    }

    async fn login(&mut self, creds: &Credentials) -> hawker_common::Result<()> {
        self.perform_login(creds).await.map_err(|e| {
            HawkerError::Authentication {
                mode: DriverMode::Direct,
                message: e.to_string(),
            }
        })
    }

    async fn navigate_to_marketplace(&mut self) -> hawker_common::Result<()> {
        match self.perform_navigate().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.page.screenshot_checkpoint("marketplace-navigation-error").await;
                Err(HawkerError::Navigation {
                    mode: DriverMode::Direct,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn create_listing(&mut self, data: &ListingData) -> hawker_common::Result<ListingResult> {
        match self.perform_create_listing(data).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.page.screenshot_checkpoint("listing-error").await;
                Err(HawkerError::ListingCreation {
                    mode: DriverMode::Direct,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn screenshot(&mut self, label: &str) -> hawker_common::Result<PathBuf> {
        Ok(self.page.screenshot(label).await?)
    }

    async fn close(self: Box<Self>) -> hawker_common::Result<()> {
        info!(target: "direct", "closing local browser");
        self.browser.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_cookies_round_trip() {
        let cookies = vec![StoredCookie {
            name: "c_user".into(),
            value: "12345".into(),
            domain: Some(".facebook.com".into()),
            path: Some("/".into()),
            secure: Some(true),
            http_only: Some(true),
        }];
        let json = serde_json::to_string(&cookies).unwrap();
        let back: Vec<StoredCookie> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].name, "c_user");
        assert_eq!(back[0].domain.as_deref(), Some(".facebook.com"));
    }

    #[test]
    fn missing_cookie_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_cookies(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_cookie_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_cookies(&path).is_err());
    }
}
