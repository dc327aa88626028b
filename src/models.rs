//! Data models for extracted posts and run accounting.
//!
//! This module defines the small set of values that flow through the
//! pipeline:
//! - [`Post`]: one unit of extracted text, the dedup key and message payload
//! - [`SearchTarget`]: one configured source search page
//! - [`RunReport`] / [`RunOutcome`]: the ephemeral summary of a single run
//!
//! A `Post` carries nothing but its text. Equality is exact string equality:
//! no whitespace or case normalization happens between runs, so a post whose
//! upstream text drifts will be treated as new again. That trade-off is
//! deliberate and documented in DESIGN.md.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A unit of extracted post text.
///
/// Persisted transparently as a JSON string, so the history file is a plain
/// array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Post(String);

impl Post {
    /// Wrap already-extracted text. The extractor guarantees the text is
    /// trimmed and non-empty before constructing a `Post`.
    pub fn new(text: impl Into<String>) -> Self {
        Post(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters, the unit the delivery ceiling is counted in.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

/// One configured source page to fetch posts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget(String);

impl SearchTarget {
    pub fn new(url: impl Into<String>) -> Self {
        SearchTarget(url.into())
    }

    /// Build a content-search URL from a list of search terms.
    ///
    /// Each term is quoted and the terms are joined with `+`, matching the
    /// source site's search syntax, then percent-encoded into the
    /// `keywords` query parameter. Results are sorted by posting date so
    /// recent posts surface first.
    pub fn content_search(base: &str, terms: &[&str]) -> Self {
        let query = terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" + ");
        let url = format!(
            "{}/search/results/content/?keywords={}&origin=GLOBAL_SEARCH_HEADER&sortBy=%22date_posted%22",
            base.trim_end_matches('/'),
            urlencoding::encode(&query),
        );
        SearchTarget(url)
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

/// Terminal outcome of a run that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every target came back empty. Distinguished from an error: the
    /// markup may have changed, or the searches genuinely had no results.
    NoPostsFound,
    /// Everything fetched was already in the history.
    NoNewPosts,
    /// There were new posts but not a single delivery succeeded; the
    /// history was left untouched so the next run retries them.
    AllDeliveriesFailed,
    /// At least one post was delivered and folded into the history.
    Completed,
}

/// Summary of one end-to-end run. Lives only for the duration of the
/// invocation; nothing here is persisted.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Posts extracted across all targets, before dedup.
    pub fetched: usize,
    /// Posts not present in the history.
    pub new: usize,
    /// Posts actually delivered this run.
    pub sent: usize,
    /// Posts whose delivery failed.
    pub failed: usize,
    /// Set when the history write failed after successful deliveries; the
    /// next run may re-attempt posts that were already sent.
    pub history_stale: bool,
    pub fetch_elapsed: Duration,
    pub total_elapsed: Duration,
}
