use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use fantoccini::key::Key;
use fantoccini::{elements::Element, Client, Locator};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::browser::behavioral::BehavioralEngine;
use crate::selectors::SelectorChain;

/// High-level page wrapper: chain-based element resolution, humanised
/// input, and screenshot checkpoints.
pub struct Page {
    client: Client,
    behavioral: BehavioralEngine,
    settle: Duration,
}

impl Page {
    pub fn new(client: Client, behavioral: BehavioralEngine, settle_ms: u64) -> Self {
        Self {
            client,
            behavioral,
            settle: Duration::from_millis(settle_ms),
        }
    }

    /// Navigate to `url` with a small human-like lead-in delay.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.behavioral.random_delay(300, 1200).await;
        self.client
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    /// Return the current page URL.
    pub async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    /// Fixed settle delay for transitions the site gives no signal for.
    pub async fn settle(&self) {
        tokio::time::sleep(self.settle).await;
    }

    /// Immediate lookup; `None` when the selector resolves nothing. Lookup
    /// errors (including selectors the engine rejects) read as a miss, the
    /// same way the chain scan treats them.
    pub async fn find(&self, selector: &str) -> Option<PageElement> {
        match self.client.find(Locator::Css(selector)).await {
            Ok(element) => Some(PageElement::new(element, &self.behavioral)),
            Err(_) => None,
        }
    }

    /// Every element matching `selector`, possibly empty.
    pub async fn find_all(&self, selector: &str) -> Result<Vec<PageElement>> {
        let elements = self.client.find_all(Locator::Css(selector)).await?;
        Ok(elements
            .into_iter()
            .map(|e| PageElement::new(e, &self.behavioral))
            .collect())
    }

    /// Walk an ordered chain and return the first candidate that resolves,
    /// together with the selector that won.
    pub async fn find_first<'c>(&self, chain: &'c SelectorChain) -> Option<(&'c str, PageElement)> {
        for selector in chain.iter() {
            if let Some(element) = self.find(selector).await {
                debug!(target: "browser.selector", selector, "chain candidate matched");
                return Some((selector, element));
            }
        }
        None
    }

    /// Wait up to `timeout` for `selector` to appear.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<PageElement> {
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .with_context(|| format!("timed out waiting for {selector}"))?;
        Ok(PageElement::new(element, &self.behavioral))
    }

    /// Send Escape to whatever holds focus; last-resort dialog dismissal.
    pub async fn press_escape(&self) -> Result<()> {
        let active = self.client.active_element().await?;
        active
            .send_keys(&String::from(char::from(Key::Escape)))
            .await?;
        Ok(())
    }

    /// Click at viewport coordinates (used to click outside a dialog's
    /// bounds). Falls back on the DOM since WebDriver pointer actions are
    /// origin-relative.
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.client
            .execute(
                "const el = document.elementFromPoint(arguments[0], arguments[1]); if (el) el.click();",
                vec![json!(x), json!(y)],
            )
            .await?;
        Ok(())
    }

    /// Capture a labelled screenshot into the log directory. Failures are
    /// reported but screenshots are debugging aids, so callers usually
    /// ignore the error.
    pub async fn screenshot(&self, label: &str) -> Result<PathBuf> {
        let dir = hawker_common::observability::log_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create screenshot dir {}", dir.display()))?;

        let timestamp = chrono::Utc::now()
            .to_rfc3339()
            .replace([':', '.'], "-");
        let path = dir.join(format!("{label}-{timestamp}.png"));

        let png = self.client.screenshot().await?;
        std::fs::write(&path, png)
            .with_context(|| format!("failed to write screenshot {}", path.display()))?;
        info!(target: "browser", path = %path.display(), "screenshot saved");
        Ok(path)
    }

    /// Screenshot that never fails the calling operation.
    pub async fn screenshot_checkpoint(&self, label: &str) {
        if let Err(e) = self.screenshot(label).await {
            warn!(target: "browser", label, error = %e, "screenshot failed");
        }
    }
}

/// Wrapper for DOM elements with humanised input helpers.
#[derive(Clone)]
pub struct PageElement {
    pub element: Element,
    behavioral: BehavioralEngine,
}

impl PageElement {
    pub fn new(element: Element, behavioral: &BehavioralEngine) -> Self {
        Self {
            element,
            behavioral: behavioral.clone(),
        }
    }

    pub async fn click(&self) -> Result<()> {
        self.behavioral.random_delay(100, 400).await;
        self.element.click().await?;
        Ok(())
    }

    /// Clear any existing value, then type with human-like timings.
    /// WebDriver `clear` only works on editable form controls, so a
    /// select-all-and-delete pass covers contenteditable surfaces.
    pub async fn clear_and_type(&self, text: &str) -> Result<()> {
        if self.element.clear().await.is_err() {
            self.element.click().await?;
            let ctrl = String::from(char::from(Key::Control));
            self.element
                .send_keys(&format!("{ctrl}a{ctrl}"))
                .await?;
            self.element
                .send_keys(&String::from(char::from(Key::Backspace)))
                .await?;
        }
        self.behavioral
            .type_text_human_like(&self.element, text)
            .await
    }

    pub async fn type_str(&self, text: &str) -> Result<()> {
        self.behavioral
            .type_text_human_like(&self.element, text)
            .await
    }

    /// The element's visible text.
    pub async fn text(&self) -> Result<String> {
        Ok(self.element.text().await?)
    }

    /// Read an attribute value.
    pub async fn attr(&self, attribute: &str) -> Result<Option<String>> {
        Ok(self.element.attr(attribute).await?)
    }

    /// Viewport rectangle as (x, y, width, height).
    pub async fn rect(&self) -> Result<(f64, f64, f64, f64)> {
        Ok(self.element.rectangle().await?)
    }

    /// Send raw keys (used for file inputs, where the "keys" are a path).
    pub async fn send_keys(&self, keys: &str) -> Result<()> {
        self.element.send_keys(keys).await?;
        Ok(())
    }
}
