//! Error taxonomy for the run pipeline.
//!
//! Each external collaborator gets its own error enum so that recoverable
//! failures (one target, one post) stay at their own granularity and only
//! session acquisition escalates to a run-level failure.

use thiserror::Error;

/// Configuration problems detected before the run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid search target {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("search terms were given but no --search-base to build URLs against")]
    TermsWithoutBase,

    #[error("no search targets configured (set SEARCH_URLS or SEARCH_TERMS)")]
    NoTargets,
}

/// Failure to establish or release an authenticated browsing session.
///
/// Always fatal for the run.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("source site rejected authentication: {0}")]
    Auth(String),

    #[error("browser gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("browser gateway error (status {status}): {message}")]
    Gateway { status: u16, message: String },
}

/// Failure to navigate to or render a single search target.
///
/// Recovered inside the fetcher; the target contributes zero posts.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("navigation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("browser gateway error (status {status}): {message}")]
    Gateway { status: u16, message: String },
}

/// Failure to deliver a single post to the notification channel.
///
/// Recovered inside the delivery pipeline; the post is counted failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("telegram request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("telegram API error (status {status}): {description}")]
    Api { status: u16, description: String },
}

/// Failure to read or write the persisted delivery history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history file is not a valid JSON string array: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Top-level run failure, surfaced to the process wrapper as a non-zero exit.
///
/// A failed history *save* is deliberately absent here: the run still
/// reports its delivery outcome and only flags the history as stale.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not establish a source site session: {0}")]
    Session(#[from] SessionError),

    #[error("could not load the delivery history: {0}")]
    History(#[from] HistoryError),
}
