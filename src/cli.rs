//! Command-line interface definitions for Feedwatch.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment
//! variables, which makes the bot easy to drive from both a shell and a CI
//! secret store. Credentials are declared optional here so that missing
//! values surface as [`crate::error::ConfigError`]s listing the variable
//! name, instead of clap usage errors.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Feedwatch bot.
///
/// # Examples
///
/// ```sh
/// # Explicit search URLs
/// feedwatch --search-urls "https://site/search?q=a,https://site/search?q=b"
///
/// # Search terms expanded into content-search URLs
/// feedwatch --search-base https://site --search-terms "angular latam remote"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Comma-separated list of full search result URLs to watch
    #[arg(long, env = "SEARCH_URLS", value_delimiter = ',')]
    pub search_urls: Vec<String>,

    /// Comma-separated list of term groups; each group (space-separated
    /// terms) becomes one content-search URL against --search-base
    #[arg(long, env = "SEARCH_TERMS", value_delimiter = ',')]
    pub search_terms: Vec<String>,

    /// Base URL of the source site, required when --search-terms is used
    #[arg(long, env = "SEARCH_BASE")]
    pub search_base: Option<String>,

    /// Source site login username
    #[arg(long, env = "SOURCE_USERNAME")]
    pub source_username: Option<String>,

    /// Source site login password
    #[arg(long, env = "SOURCE_PASSWORD")]
    pub source_password: Option<String>,

    /// Telegram bot token used to deliver posts
    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat the posts are delivered to
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    /// Base URL of the headless-browser gateway
    #[arg(long, env = "BROWSER_GATEWAY_URL", default_value = "http://localhost:3000")]
    pub gateway_url: String,

    /// Access token for the gateway, if it requires one
    #[arg(long, env = "BROWSER_GATEWAY_TOKEN")]
    pub gateway_token: Option<String>,

    /// Path of the delivered-post history file
    #[arg(long, env = "HISTORY_FILE", default_value = "history.json")]
    pub history_file: PathBuf,

    /// Seconds to wait between target fetches
    #[arg(long, env = "FETCH_PACING_SECS", default_value_t = 2)]
    pub fetch_pacing_secs: u64,

    /// Seconds to wait between successful deliveries
    #[arg(long, env = "DELIVERY_PACING_SECS", default_value_t = 2)]
    pub delivery_pacing_secs: u64,

    /// Seconds before an in-flight navigation is abandoned
    #[arg(long, env = "NAVIGATION_TIMEOUT_SECS", default_value_t = 45)]
    pub navigation_timeout_secs: u64,

    /// Directory for debug screenshots of failed scrapes (disabled if unset)
    #[arg(long, env = "DEBUG_DIR")]
    pub debug_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "feedwatch",
            "--search-urls",
            "https://example.com/a,https://example.com/b",
            "--history-file",
            "/tmp/history.json",
        ]);

        assert_eq!(cli.search_urls.len(), 2);
        assert_eq!(cli.history_file, PathBuf::from("/tmp/history.json"));
        assert_eq!(cli.fetch_pacing_secs, 2);
        assert_eq!(cli.navigation_timeout_secs, 45);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["feedwatch"]);

        assert!(cli.search_urls.is_empty());
        assert!(cli.source_username.is_none());
        assert_eq!(cli.gateway_url, "http://localhost:3000");
        assert_eq!(cli.history_file, PathBuf::from("history.json"));
        assert_eq!(cli.delivery_pacing_secs, 2);
    }
}
