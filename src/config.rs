//! Runtime configuration, built once at startup and passed into the run.
//!
//! All knobs arrive through the CLI (each with an env-var fallback, see
//! [`crate::cli::Cli`]); this module validates them into a [`Config`] the
//! core components receive by reference. Nothing in the pipeline reads the
//! environment after this point.

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::extract::ExtractionRules;
use crate::models::SearchTarget;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Login credentials for the source site.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where the headless-browser gateway lives and how long navigation may
/// take before the request is abandoned.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub navigation_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Source pages to fetch, in delivery order.
    pub targets: Vec<SearchTarget>,
    pub credentials: Credentials,
    pub gateway: GatewayConfig,
    pub telegram: TelegramConfig,
    /// Location of the delivered-post history artifact.
    pub history_path: PathBuf,
    /// Pause between target fetches.
    pub fetch_pacing: Duration,
    /// Pause between successful deliveries.
    pub delivery_pacing: Duration,
    /// Where to drop debug screenshots; disabled when unset.
    pub debug_dir: Option<PathBuf>,
    pub extraction: ExtractionRules,
}

impl Config {
    /// Validate CLI input into a runnable configuration.
    ///
    /// Empty strings count as missing: an unset secret in CI frequently
    /// arrives as an empty env var rather than an absent one.
    pub fn from_cli(cli: Cli) -> Result<Config, ConfigError> {
        let username = required(cli.source_username, "SOURCE_USERNAME")?;
        let password = required(cli.source_password, "SOURCE_PASSWORD")?;
        let bot_token = required(cli.telegram_bot_token, "TELEGRAM_BOT_TOKEN")?;
        let chat_id = required(cli.telegram_chat_id, "TELEGRAM_CHAT_ID")?;

        let mut targets = Vec::new();
        for raw in &cli.search_urls {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            Url::parse(raw).map_err(|e| ConfigError::InvalidTarget {
                url: raw.to_string(),
                reason: e.to_string(),
            })?;
            targets.push(SearchTarget::new(raw));
        }

        if !cli.search_terms.is_empty() {
            let base = cli.search_base.as_deref().ok_or(ConfigError::TermsWithoutBase)?;
            Url::parse(base).map_err(|e| ConfigError::InvalidTarget {
                url: base.to_string(),
                reason: e.to_string(),
            })?;
            for entry in &cli.search_terms {
                let terms: Vec<&str> = entry.split_whitespace().collect();
                if terms.is_empty() {
                    continue;
                }
                targets.push(SearchTarget::content_search(base, &terms));
            }
        }

        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        Ok(Config {
            targets,
            credentials: Credentials { username, password },
            gateway: GatewayConfig {
                base_url: cli.gateway_url,
                token: cli.gateway_token.filter(|t| !t.trim().is_empty()),
                navigation_timeout: Duration::from_secs(cli.navigation_timeout_secs),
            },
            telegram: TelegramConfig { bot_token, chat_id },
            history_path: cli.history_file,
            fetch_pacing: Duration::from_secs(cli.fetch_pacing_secs),
            delivery_pacing: Duration::from_secs(cli.delivery_pacing_secs),
            debug_dir: cli.debug_dir,
            extraction: ExtractionRules::default(),
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn base_args() -> Vec<&'static str> {
        vec![
            "feedwatch",
            "--source-username",
            "user@example.com",
            "--source-password",
            "hunter2",
            "--telegram-bot-token",
            "123:abc",
            "--telegram-chat-id",
            "42",
        ]
    }

    #[test]
    fn test_explicit_urls_become_targets() {
        let mut args = base_args();
        args.extend(["--search-urls", "https://example.com/a,https://example.com/b"]);
        let config = Config::from_cli(Cli::parse_from(args)).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].url(), "https://example.com/a");
    }

    #[test]
    fn test_search_terms_expand_against_base() {
        let mut args = base_args();
        args.extend([
            "--search-base",
            "https://example.com",
            "--search-terms",
            "angular latam remote",
        ]);
        let config = Config::from_cli(Cli::parse_from(args)).unwrap();
        assert_eq!(config.targets.len(), 1);
        assert!(config.targets[0].url().contains("%22angular%22"));
    }

    #[test]
    fn test_terms_without_base_rejected() {
        let mut args = base_args();
        args.extend(["--search-terms", "angular"]);
        let err = Config::from_cli(Cli::parse_from(args)).unwrap_err();
        assert!(matches!(err, ConfigError::TermsWithoutBase));
    }

    #[test]
    fn test_no_targets_rejected() {
        let err = Config::from_cli(Cli::parse_from(base_args())).unwrap_err();
        assert!(matches!(err, ConfigError::NoTargets));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut args = base_args();
        args.extend(["--search-urls", "not a url"]);
        let err = Config::from_cli(Cli::parse_from(args)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { .. }));
    }

    #[test]
    fn test_empty_credential_counts_as_missing() {
        let args = vec![
            "feedwatch",
            "--source-username",
            "",
            "--source-password",
            "hunter2",
            "--telegram-bot-token",
            "123:abc",
            "--telegram-chat-id",
            "42",
            "--search-urls",
            "https://example.com/a",
        ];
        let err = Config::from_cli(Cli::parse_from(args)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SOURCE_USERNAME")));
    }

    #[test]
    fn test_debug_output_redacts_password() {
        let creds = Credentials {
            username: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
