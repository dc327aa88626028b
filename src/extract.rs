//! Post text extraction from rendered search result pages.
//!
//! The source site's markup is third-party, unversioned, and changes without
//! notice. Instead of pinning a single selector and hard-failing the run
//! when it stops matching, each feed-item container is probed with an
//! ordered list of selector strategies and the first one that yields real
//! text wins. A container where nothing matches simply contributes no post.
//!
//! # Extraction algorithm
//!
//! 1. Find every feed-item container on the page (a page may hold zero or
//!    many); document order is preserved in the output.
//! 2. For each container, evaluate the strategy selectors in priority
//!    order and stop at the first non-empty trimmed text.
//! 3. Drop texts at or under the minimum length; short fragments are
//!    almost always navigation chrome, not post content.
//!
//! A strategy selector that fails to parse is skipped, and an unparseable
//! container selector yields an empty page; neither is ever a page-level
//! error.

use crate::models::Post;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Posts at or under this many characters are presumed to be UI chrome
/// (reaction labels, "see more" stubs) and are discarded.
pub const MIN_POST_CHARS: usize = 50;

/// CSS selector for one feed-item container on a search result page.
const FEED_ITEM_CONTAINER: &str = "div.feed-shared-update-v2";

/// Selector the browser should wait for before the page counts as rendered.
pub const RESULTS_READY_SELECTOR: &str = ".scaffold-finite-scroll__content";

/// Prioritized selectors for the post text inside one container, most
/// specific first. Kept in sync with the source site's markup by hand;
/// when the site ships a redesign, the older entries keep matching legacy
/// containers while a new entry is added at the front.
const TEXT_STRATEGIES: [&str; 4] = [
    "div.update-components-text span.break-words",
    ".feed-shared-text",
    ".feed-shared-update-v2__description",
    "[data-test-id=\"main-feed-activity-card\"] .break-words",
];

/// How to locate post text within a page.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    /// Selector for one feed-item container.
    pub container: String,
    /// Ordered text selectors, tried per container until one yields text.
    pub strategies: Vec<String>,
    /// Minimum character count for extracted text to count as a post.
    pub min_chars: usize,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        ExtractionRules {
            container: FEED_ITEM_CONTAINER.to_string(),
            strategies: TEXT_STRATEGIES.iter().map(|s| s.to_string()).collect(),
            min_chars: MIN_POST_CHARS,
        }
    }
}

/// Extract posts from a rendered page.
///
/// Returns one [`Post`] per container that yields usable text, in document
/// order. Never fails: malformed selectors and unmatched containers only
/// reduce the output.
pub fn extract_posts(html: &str, rules: &ExtractionRules) -> Vec<Post> {
    let container = match Selector::parse(&rules.container) {
        Ok(sel) => sel,
        Err(e) => {
            warn!(selector = %rules.container, error = %e, "Container selector does not parse; page yields nothing");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut posts = Vec::new();
    let mut skipped_short = 0usize;

    for item in document.select(&container) {
        match first_matching_text(&item, &rules.strategies) {
            Some(text) if text.chars().count() > rules.min_chars => {
                posts.push(Post::new(text));
            }
            Some(text) => {
                debug!(chars = text.chars().count(), "Discarding short fragment");
                skipped_short += 1;
            }
            None => {}
        }
    }

    debug!(
        containers = document.select(&container).count(),
        posts = posts.len(),
        skipped_short,
        "Extracted posts from page"
    );
    posts
}

/// Try each strategy in priority order inside one container; the first
/// selector yielding non-empty trimmed text wins.
fn first_matching_text(item: &ElementRef, strategies: &[String]) -> Option<String> {
    for strategy in strategies {
        let Ok(selector) = Selector::parse(strategy) else {
            debug!(selector = %strategy, "Strategy selector does not parse; skipping");
            continue;
        };
        if let Some(element) = item.select(&selector).next() {
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}
