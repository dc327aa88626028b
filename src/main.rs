//! # Feedwatch
//!
//! A small watcher bot that scrapes textual posts from a set of search
//! result pages on a third-party site, filters out posts it has already
//! delivered in previous runs, and sends the new ones to a Telegram chat.
//!
//! ## Features
//!
//! - Multi-strategy extraction that degrades gracefully when the source
//!   site's markup changes
//! - Exact-match dedup against a JSON history file that only grows
//! - Sequential, paced delivery with per-post truncation and retry
//! - Per-target and per-post failure isolation; only a failed login or an
//!   unreadable history aborts a run
//!
//! ## Usage
//!
//! ```sh
//! feedwatch --search-base https://site --search-terms "angular latam remote"
//! ```
//!
//! ## Architecture
//!
//! One run is a linear pipeline:
//! 1. **Fetching**: navigate each configured search target through the
//!    headless-browser gateway and extract post text
//! 2. **Deduplicating**: drop everything already present in the history
//! 3. **Delivering**: send the remainder to Telegram, one by one
//! 4. **Persisting**: fold the successfully sent posts into the history,
//!    only when at least one went out
//!
//! A failed run exits non-zero so an external scheduler (cron, CI) can see
//! it; a best-effort failure message is also sent to the same chat.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod error;
mod extract;
mod fetch;
mod history;
mod models;
mod notify;
mod pipeline;
mod run;
mod session;
mod utils;

use cli::Cli;
use config::Config;
use extract::RESULTS_READY_SELECTOR;
use history::JsonFileHistory;
use models::RunOutcome;
use notify::{RetryNotifier, TelegramNotifier};
use session::RemoteBrowser;

/// Retry attempts for one Telegram delivery before it counts as failed.
const DELIVERY_RETRIES: usize = 3;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("feedwatch starting up");

    // .env is a convenience for local runs; absence is fine.
    if dotenvy::dotenv().is_ok() {
        debug!("Loaded environment from .env");
    }

    let args = Cli::parse();
    let config = match Config::from_cli(args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration is incomplete; not starting");
            return Err(e.into());
        }
    };
    info!(
        targets = config.targets.len(),
        history = %config.history_path.display(),
        gateway = %config.gateway.base_url,
        "Configuration loaded"
    );

    // --- Wire collaborators ---
    let provider = RemoteBrowser::new(
        &config.gateway,
        config.credentials.clone(),
        RESULTS_READY_SELECTOR,
    );
    let telegram = TelegramNotifier::new(&config.telegram.bot_token, &config.telegram.chat_id);
    let notifier = RetryNotifier::new(
        telegram,
        DELIVERY_RETRIES,
        std::time::Duration::from_secs(1),
    );
    let history = JsonFileHistory::new(&config.history_path);

    // --- Run ---
    match run::run(&config, &provider, &notifier, &history).await {
        Ok(report) => {
            match report.outcome {
                RunOutcome::NoPostsFound => warn!(
                    "No posts found on any target; the searches may be empty or the markup changed"
                ),
                RunOutcome::NoNewPosts => info!("No new posts to send"),
                RunOutcome::AllDeliveriesFailed => {
                    warn!(failed = report.failed, "Every delivery failed; nothing persisted")
                }
                RunOutcome::Completed => {}
            }
            if report.history_stale {
                warn!("History write failed; next run may re-send already-delivered posts");
            }
            info!(
                fetched = report.fetched,
                new = report.new,
                sent = report.sent,
                failed = report.failed,
                fetch_secs = report.fetch_elapsed.as_secs(),
                total_secs = report.total_elapsed.as_secs(),
                "Run complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            Err(e.into())
        }
    }
}
