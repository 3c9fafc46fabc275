//! Loader for workspace configuration with YAML + environment overlays.
//!
//! `hawker.yaml` carries the marketplace credentials, the remote browser
//! cloud settings, local browser knobs, and queue pacing. Every section has
//! serde defaults so a deployment can run from `HAWKER_`-prefixed
//! environment variables alone. `${VAR}` placeholders in string values are
//! expanded (depth-capped) after the sources are merged, so secrets stay
//! out of the YAML file itself.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize, Default)]
pub struct HawkerConfig {
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Account used to log into the marketplace.
#[derive(Debug, Deserialize, Default)]
pub struct MarketplaceConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Remote browser cloud (session API + WebDriver endpoint per session).
#[derive(Debug, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_remote_api_base")]
    pub api_base: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            project_id: String::new(),
            api_base: default_remote_api_base(),
        }
    }
}

/// Locally launched browser (the fallback driver).
#[derive(Debug, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_cookies_path")]
    pub cookies_path: String,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            webdriver_url: default_webdriver_url(),
            cookies_path: default_cookies_path(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

/// Queue pacing and driver budgets.
#[derive(Debug, Deserialize)]
pub struct QueueConfig {
    /// Lower bound of the randomized inter-row delay, seconds.
    #[serde(default = "default_delay_min")]
    pub delay_min_secs: u64,
    /// Upper bound of the randomized inter-row delay, seconds.
    #[serde(default = "default_delay_max")]
    pub delay_max_secs: u64,
    /// Poll interval while paused, seconds.
    #[serde(default = "default_pause_poll")]
    pub pause_poll_secs: u64,
    /// Settle delay after clicks that trigger page transitions, milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Attempt budget for the post-login challenge handler.
    #[serde(default = "default_challenge_attempts")]
    pub challenge_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            delay_min_secs: default_delay_min(),
            delay_max_secs: default_delay_max(),
            pause_poll_secs: default_pause_poll(),
            settle_ms: default_settle_ms(),
            challenge_attempts: default_challenge_attempts(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_remote_api_base() -> String {
    "https://api.browsercloud.example.com".into()
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}
fn default_cookies_path() -> String {
    "marketplace-cookies.json".into()
}
fn default_uploads_dir() -> String {
    "./uploads".into()
}
fn default_delay_min() -> u64 {
    30
}
fn default_delay_max() -> u64 {
    60
}
fn default_pause_poll() -> u64 {
    5
}
fn default_settle_ms() -> u64 {
    3000
}
fn default_challenge_attempts() -> u32 {
    5
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct HawkerConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for HawkerConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HawkerConfigLoader {
    /// Start with sensible defaults: optional YAML file + `HAWKER_` env
    /// overrides (`HAWKER_MARKETPLACE__EMAIL=...`).
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("HAWKER").separator("__"));
        Self { builder }
    }

    /// Attach a config file; the `config` crate infers the format by suffix.
    /// Missing files are tolerated so env-only deployments keep working.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use hawker_config::HawkerConfigLoader;
    ///
    /// let cfg = HawkerConfigLoader::new()
    ///     .with_yaml_str("queue:\n  delay_min_secs: 2\n  delay_max_secs: 4")
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(cfg.queue.delay_min_secs, 2);
    /// assert_eq!(cfg.queue.pause_poll_secs, 5);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly
    /// typed config, expanding `${VAR}` placeholders first.
    pub fn load(self) -> Result<HawkerConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: HawkerConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
