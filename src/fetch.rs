//! Sequential fetching of all configured search targets.
//!
//! One authenticated session is created for the whole pass and released
//! exactly once at the end, whatever happened in between. Targets are
//! visited one at a time, in configured order, with a pacing pause between
//! them; a failure on one target is logged and contributes zero posts while
//! the loop carries on. Only the session creation itself can fail the run.

use crate::error::SessionError;
use crate::extract::{extract_posts, ExtractionRules};
use crate::models::{Post, SearchTarget};
use crate::session::{BrowsingSession, SessionProvider};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Fetch and extract posts from every target, in target order.
///
/// Returns the concatenation of per-target extraction output. Navigation
/// and extraction failures are absorbed per target; a [`SessionError`]
/// from session creation propagates and fails the run.
#[instrument(level = "info", skip_all, fields(targets = targets.len()))]
pub async fn fetch_all(
    provider: &dyn SessionProvider,
    targets: &[SearchTarget],
    rules: &ExtractionRules,
    pacing: Duration,
    debug_dir: Option<&Path>,
) -> Result<Vec<Post>, SessionError> {
    let mut session = provider.create_session().await?;

    let mut all_posts = Vec::new();
    for (i, target) in targets.iter().enumerate() {
        match session.fetch_page(target.url()).await {
            Ok(html) => {
                let posts = extract_posts(&html, rules);
                info!(url = %target.url(), count = posts.len(), "Scraped posts from target");
                all_posts.extend(posts);
            }
            Err(e) => {
                warn!(url = %target.url(), error = %e, "Target failed; continuing with next");
                save_debug_screenshot(session.as_mut(), debug_dir, "error").await;
            }
        }

        if i + 1 < targets.len() {
            sleep(pacing).await;
        }
    }

    if all_posts.is_empty() {
        warn!("No posts were scraped from any target");
        save_debug_screenshot(session.as_mut(), debug_dir, "no-posts").await;
    } else {
        info!(count = all_posts.len(), "Total posts scraped");
    }

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close browsing session");
    }

    Ok(all_posts)
}

/// Best-effort screenshot for debugging scrape failures. Every failure on
/// this path is logged and swallowed.
async fn save_debug_screenshot(
    session: &mut dyn BrowsingSession,
    debug_dir: Option<&Path>,
    label: &str,
) {
    let Some(dir) = debug_dir else {
        return;
    };

    let bytes = match session.screenshot().await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "Failed to capture debug screenshot");
            return;
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "Failed to create debug directory");
        return;
    }

    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
    let path = dir.join(format!("{label}-{stamp}.png"));
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => info!(path = %path.display(), "Saved debug screenshot"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to save debug screenshot"),
    }
}
