use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hawker_common::observability::{init_logging, LogConfig};
use hawker_common::Credentials;
use hawker_config::{HawkerConfig, HawkerConfigLoader};
use hawker_drivers::factory::WebDriverFactory;
use hawker_drivers::images::LocalFiles;
use hawker_drivers::{DriverSettings, RemoteSettings};
use hawker_queue::{ListingQueue, QueuePacing};
use hawker_sheets::MemorySheet;
use tracing::{info, warn};

mod wiring;

/// Marketplace listing automation: reads listing rows, drives a browser to
/// create them, and writes status back.
#[derive(Debug, Parser)]
#[command(name = "hawker", version)]
struct Cli {
    /// Configuration file (YAML); missing file falls back to env/defaults.
    #[arg(long, default_value = "hawker.yaml")]
    config: PathBuf,

    /// Identifier of the sheet being processed (carried in events/logs).
    #[arg(long, env = "HAWKER_SPREADSHEET_ID", default_value = "local")]
    spreadsheet_id: String,

    /// Row fixture consumed when no external gateway is wired in:
    /// a JSON array of cell arrays in sheet column order.
    #[arg(long, default_value = "rows.json")]
    rows: PathBuf,

    /// Selector-chain overrides (YAML); defaults are built in.
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Force headless on or off, overriding the config file.
    #[arg(long)]
    headless: Option<bool>,

    /// Process the current pending rows once, then exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg: HawkerConfig = HawkerConfigLoader::new()
        .with_file(&cli.config)
        .load()
        .context("failed to load configuration")?;
    if let Some(headless) = cli.headless {
        cfg.browser.headless = headless;
    }

    let log_path = init_logging(LogConfig {
        emit_stderr: true,
        ..LogConfig::default()
    })?;
    info!(log_path = %log_path.display(), "logging initialised");

    let credentials = Credentials {
        email: cfg.marketplace.email.clone(),
        password: cfg.marketplace.password.clone(),
    };

    let book = wiring::load_selector_book(cli.selectors.as_deref())?;
    let factory = Arc::new(WebDriverFactory::new(
        remote_settings(&cfg),
        driver_settings(&cfg),
        book,
        Arc::new(LocalFiles::new(&cfg.browser.uploads_dir)),
    ));

    let store: Arc<MemorySheet> = wiring::load_store(&cli.rows)?;
    let pacing = QueuePacing {
        delay_min: std::time::Duration::from_secs(cfg.queue.delay_min_secs),
        delay_max: std::time::Duration::from_secs(cfg.queue.delay_max_secs),
        pause_poll: std::time::Duration::from_secs(cfg.queue.pause_poll_secs),
    };

    let mut queue = ListingQueue::new(store.clone(), factory, credentials, pacing);
    wiring::spawn_event_logger(queue.subscribe());

    if cli.once {
        queue.process_once(&cli.spreadsheet_id).await?;
        queue.join().await;
    } else {
        queue.start(&cli.spreadsheet_id);
        let mut state_rx = queue.watch_state();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, stopping after the current item");
                queue.stop();
            }
            _ = async {
                loop {
                    if !state_rx.borrow().is_running {
                        break;
                    }
                    if state_rx.changed().await.is_err() {
                        break;
                    }
                }
            } => {}
        }
        queue.join().await;
    }

    let state = queue.status();
    info!(
        processed = state.processed_count,
        failed = state.failed_count,
        "run finished"
    );

    // The in-memory sheet only lives for this process; surface the final
    // cells so a dry run is inspectable.
    for row in store.all_rows().await {
        info!(
            row_number = row.row_number,
            title = %row.item_name,
            status = %row.status,
            listing_url = row.listing_url.as_deref().unwrap_or("-"),
            "row"
        );
    }
    if state.failed_count > 0 {
        warn!("some rows failed; see the error log column for details");
    }
    Ok(())
}

fn driver_settings(cfg: &HawkerConfig) -> DriverSettings {
    DriverSettings {
        headless: cfg.browser.headless,
        webdriver_url: cfg.browser.webdriver_url.clone(),
        cookies_path: PathBuf::from(&cfg.browser.cookies_path),
        settle_ms: cfg.queue.settle_ms,
        challenge_attempts: cfg.queue.challenge_attempts,
    }
}

fn remote_settings(cfg: &HawkerConfig) -> Option<RemoteSettings> {
    if !cfg.remote.enabled {
        return None;
    }
    if cfg.remote.api_key.is_empty() || cfg.remote.project_id.is_empty() {
        warn!("remote driver enabled but credentials are missing; running direct-only");
        return None;
    }
    Some(RemoteSettings {
        api_base: cfg.remote.api_base.clone(),
        api_key: cfg.remote.api_key.clone(),
        project_id: cfg.remote.project_id.clone(),
    })
}
