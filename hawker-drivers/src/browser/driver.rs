use std::collections::HashMap;

use anyhow::Result;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use webdriver::capabilities::Capabilities;

use crate::browser::{behavioral::BehavioralEngine, page::Page};
use crate::DriverSettings;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Thin wrapper around a `fantoccini` WebDriver client. One instance per
/// driver session; the page handle clones the underlying client.
pub struct Browser {
    pub client: Client,
    behavioral: BehavioralEngine,
}

impl Browser {
    /// Launch a session on the local WebDriver service (chromedriver).
    ///
    /// Image/font/media *downloads* are suppressed via content-settings
    /// prefs and blink flags to cut page weight; outgoing file uploads are
    /// unaffected.
    pub async fn launch_local(settings: &DriverSettings) -> Result<Self> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();

        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-accelerated-2d-canvas".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--blink-settings=imagesEnabled=false".to_string(),
            "--window-size=1280,720".to_string(),
            format!("--user-agent={USER_AGENT}"),
        ];
        if settings.headless {
            args.push("--headless".to_string());
            args.push("--disable-gpu".to_string());
        }
        chrome_opts.insert("args".to_string(), json!(args));
        chrome_opts.insert(
            "prefs".to_string(),
            json!({
                "profile.managed_default_content_settings.images": 2,
            }),
        );
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&settings.webdriver_url)
            .await?;

        Ok(Self {
            client,
            behavioral: BehavioralEngine::new(),
        })
    }

    /// Attach to a remote session the browser cloud already provisioned.
    /// The cloud configures the browser itself, so no capabilities are sent.
    pub async fn attach_remote(connect_url: &str) -> Result<Self> {
        let client = ClientBuilder::native().connect(connect_url).await?;
        Ok(Self {
            client,
            behavioral: BehavioralEngine::new(),
        })
    }

    /// Page handle sharing this browser's session.
    pub fn page(&self, settle_ms: u64) -> Page {
        Page::new(self.client.clone(), self.behavioral.clone(), settle_ms)
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}
