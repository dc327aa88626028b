//! Deduplication and the sequential delivery pipeline.
//!
//! Dedup is a pure, order-preserving set difference against the loaded
//! history. Delivery walks the new posts one at a time: each post is
//! truncated to the channel ceiling, sent, and paced before the next so the
//! channel's abuse detection stays quiet. One post failing never stops the
//! rest; the report carries the exact subsequence that made it through,
//! because only those may be folded into the history.

use crate::models::Post;
use crate::notify::Notifier;
use crate::utils::{truncate_chars, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Posts longer than this many characters are truncated before sending.
/// Telegram's hard message ceiling is 4096; the margin leaves room for the
/// truncation marker.
pub const MAX_POST_CHARS: usize = 4000;

/// Appended to a post cut at [`MAX_POST_CHARS`].
pub const TRUNCATION_MARKER: &str = "...\n\n[Post truncated due to length]";

/// Posts not yet present in the history, in fetched order.
///
/// Pure function: same inputs, same output. Comparison is exact string
/// equality, and duplicates within `fetched` itself are not collapsed;
/// two identical new posts both pass through.
pub fn filter_new(fetched: &[Post], history: &[Post]) -> Vec<Post> {
    let seen: HashSet<&str> = history.iter().map(|p| p.as_str()).collect();
    fetched
        .iter()
        .filter(|p| !seen.contains(p.as_str()))
        .cloned()
        .collect()
}

/// The text actually handed to the notifier for one post.
fn delivery_payload(post: &Post) -> String {
    if post.char_len() > MAX_POST_CHARS {
        let mut text = truncate_chars(post.as_str(), MAX_POST_CHARS).to_string();
        text.push_str(TRUNCATION_MARKER);
        text
    } else {
        post.as_str().to_string()
    }
}

/// Outcome of one delivery pass.
#[derive(Debug)]
pub struct DeliveryReport {
    /// The subsequence of the input that was actually delivered.
    pub sent: Vec<Post>,
    pub failed: usize,
}

/// Deliver each post in order, pacing between successful sends.
///
/// A failed delivery is logged and counted; subsequent posts still go out.
#[instrument(level = "info", skip_all, fields(count = posts.len()))]
pub async fn deliver_all(
    notifier: &dyn Notifier,
    posts: &[Post],
    pacing: Duration,
) -> DeliveryReport {
    let total = posts.len();

    let results: Vec<Option<Post>> = stream::iter(posts.iter().enumerate())
        .then(|(i, post)| async move {
            let payload = delivery_payload(post);
            match notifier.deliver(&payload).await {
                Ok(()) => {
                    info!(index = i + 1, total, "Delivered post");
                    // Pause between sends to stay under the channel's
                    // rate limits; no point sleeping after the last one.
                    if i + 1 < total {
                        sleep(pacing).await;
                    }
                    Some(post.clone())
                }
                Err(e) => {
                    warn!(
                        index = i + 1,
                        total,
                        error = %e,
                        preview = %truncate_for_log(post.as_str(), 80),
                        "Delivery failed; continuing with remaining posts"
                    );
                    None
                }
            }
        })
        .collect()
        .await;

    let sent: Vec<Post> = results.into_iter().flatten().collect();
    let failed = total - sent.len();
    info!(sent = sent.len(), failed, "Delivery pass complete");

    DeliveryReport { sent, failed }
}
