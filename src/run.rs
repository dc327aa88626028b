//! The run coordinator: one end-to-end fetch → dedup → deliver → persist
//! pass.
//!
//! The flow is linear with early exits for the benign empty cases, and the
//! history is only ever rewritten when at least one delivery succeeded,
//! and then only with the posts that actually went out. A run that sends
//! nothing leaves the history byte-for-byte alone, so the next run retries
//! the same posts rather than silently forgetting them.
//!
//! Fatal failures (the session could not be established, the history could
//! not be read) produce one best-effort failure notification through the
//! same channel used for posts, then surface to the caller so the process
//! exits non-zero and an external supervisor can see the run as failed.

use crate::config::Config;
use crate::error::RunError;
use crate::fetch::fetch_all;
use crate::history::HistoryStore;
use crate::models::{RunOutcome, RunReport};
use crate::notify::Notifier;
use crate::pipeline::{deliver_all, filter_new};
use crate::session::SessionProvider;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Execute one run.
#[instrument(level = "info", skip_all)]
pub async fn run(
    config: &Config,
    provider: &dyn SessionProvider,
    notifier: &dyn Notifier,
    history_store: &dyn HistoryStore,
) -> Result<RunReport, RunError> {
    let run_t0 = Instant::now();

    let fetch_t0 = Instant::now();
    let fetched = match fetch_all(
        provider,
        &config.targets,
        &config.extraction,
        config.fetch_pacing,
        config.debug_dir.as_deref(),
    )
    .await
    {
        Ok(fetched) => fetched,
        Err(e) => {
            let run_err = RunError::Session(e);
            notify_failure(notifier, &run_err).await;
            return Err(run_err);
        }
    };
    let fetch_elapsed = fetch_t0.elapsed();
    info!(count = fetched.len(), ?fetch_elapsed, "Fetch phase complete");

    if fetched.is_empty() {
        return Ok(RunReport {
            outcome: RunOutcome::NoPostsFound,
            fetched: 0,
            new: 0,
            sent: 0,
            failed: 0,
            history_stale: false,
            fetch_elapsed,
            total_elapsed: run_t0.elapsed(),
        });
    }

    let history = match history_store.load().await {
        Ok(history) => history,
        Err(e) => {
            // Treating an unreadable history as empty would re-deliver the
            // entire backlog, so this aborts the run instead.
            let run_err = RunError::History(e);
            notify_failure(notifier, &run_err).await;
            return Err(run_err);
        }
    };

    let new = filter_new(&fetched, &history);
    info!(
        fetched = fetched.len(),
        known = history.len(),
        new = new.len(),
        "Deduplicated against history"
    );

    if new.is_empty() {
        info!("No new posts to send");
        return Ok(RunReport {
            outcome: RunOutcome::NoNewPosts,
            fetched: fetched.len(),
            new: 0,
            sent: 0,
            failed: 0,
            history_stale: false,
            fetch_elapsed,
            total_elapsed: run_t0.elapsed(),
        });
    }

    let delivery = deliver_all(notifier, &new, config.delivery_pacing).await;

    if delivery.sent.is_empty() {
        warn!(failed = delivery.failed, "Every delivery failed; history left untouched");
        return Ok(RunReport {
            outcome: RunOutcome::AllDeliveriesFailed,
            fetched: fetched.len(),
            new: new.len(),
            sent: 0,
            failed: delivery.failed,
            history_stale: false,
            fetch_elapsed,
            total_elapsed: run_t0.elapsed(),
        });
    }

    // Fold in only what was actually delivered; posts whose send failed
    // stay out of the history so the next run retries them.
    let mut updated = history;
    updated.extend(delivery.sent.iter().cloned());

    let history_stale = match history_store.save(&updated).await {
        Ok(()) => false,
        Err(e) => {
            error!(error = %e, "Failed to persist history; next run may re-send already-delivered posts");
            true
        }
    };

    Ok(RunReport {
        outcome: RunOutcome::Completed,
        fetched: fetched.len(),
        new: new.len(),
        sent: delivery.sent.len(),
        failed: delivery.failed,
        history_stale,
        fetch_elapsed,
        total_elapsed: run_t0.elapsed(),
    })
}

/// Best-effort failure notification through the normal delivery channel.
/// Its own failure is only logged.
async fn notify_failure(notifier: &dyn Notifier, err: &RunError) {
    let message = format!(
        "Feedwatch run failed\n\nTime: {}\nError: {}\n\nCheck the logs for details.",
        chrono::Utc::now().to_rfc3339(),
        err,
    );
    if let Err(e) = notifier.deliver(&message).await {
        error!(error = %e, "Failed to send failure notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Credentials, GatewayConfig, TelegramConfig};
    use crate::error::{DeliveryError, HistoryError, NavigationError, SessionError};
    use crate::extract::ExtractionRules;
    use crate::history::HistoryStore;
    use crate::models::{Post, SearchTarget};
    use crate::session::{BrowsingSession, SessionProvider};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    const POST_A: &str =
        "We are hiring a remote frontend engineer to join our LATAM team this quarter. Post A.";
    const POST_B: &str =
        "We are hiring a remote frontend engineer to join our LATAM team this quarter. Post B.";
    const POST_C: &str =
        "We are hiring a remote frontend engineer to join our LATAM team this quarter. Post C.";

    fn page_with_posts(texts: &[&str]) -> String {
        let items = texts
            .iter()
            .map(|t| {
                format!(
                    "<div class=\"feed-shared-update-v2\"><p class=\"feed-shared-text\">{t}</p></div>"
                )
            })
            .collect::<Vec<_>>()
            .join("");
        format!("<html><body>{items}</body></html>")
    }

    fn test_config(target_count: usize) -> Config {
        Config {
            targets: (0..target_count)
                .map(|i| SearchTarget::new(format!("https://s/{i}")))
                .collect(),
            credentials: Credentials {
                username: "u".to_string(),
                password: "p".to_string(),
            },
            gateway: GatewayConfig {
                base_url: "http://localhost:3000".to_string(),
                token: None,
                navigation_timeout: Duration::from_secs(5),
            },
            telegram: TelegramConfig {
                bot_token: "t".to_string(),
                chat_id: "c".to_string(),
            },
            history_path: "unused.json".into(),
            fetch_pacing: Duration::ZERO,
            delivery_pacing: Duration::ZERO,
            debug_dir: None,
            extraction: ExtractionRules::default(),
        }
    }

    #[derive(Debug)]
    struct PageSession {
        pages: VecDeque<Result<String, NavigationError>>,
    }

    #[async_trait]
    impl BrowsingSession for PageSession {
        async fn fetch_page(&mut self, _url: &str) -> Result<String, NavigationError> {
            self.pages.pop_front().expect("unexpected fetch_page call")
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    struct PageProvider {
        pages: Mutex<Option<VecDeque<Result<String, NavigationError>>>>,
    }

    impl PageProvider {
        fn serving(pages: Vec<Result<String, NavigationError>>) -> Self {
            PageProvider {
                pages: Mutex::new(Some(pages.into())),
            }
        }

        fn failing() -> Self {
            PageProvider {
                pages: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl SessionProvider for PageProvider {
        async fn create_session(&self) -> Result<Box<dyn BrowsingSession>, SessionError> {
            match self.pages.lock().unwrap().take() {
                Some(pages) => Ok(Box::new(PageSession { pages })),
                None => Err(SessionError::Auth("login rejected".to_string())),
            }
        }
    }

    struct RecordingNotifier {
        fail_on: Vec<usize>,
        delivered: Mutex<Vec<String>>,
        calls: Mutex<usize>,
    }

    impl RecordingNotifier {
        fn new(fail_on: &[usize]) -> Self {
            RecordingNotifier {
                fail_on: fail_on.to_vec(),
                delivered: Mutex::new(Vec::new()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
            let mut calls = self.calls.lock().unwrap();
            let index = *calls;
            *calls += 1;
            if self.fail_on.contains(&index) {
                return Err(DeliveryError::Api {
                    status: 500,
                    description: "scripted failure".to_string(),
                });
            }
            self.delivered.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct RecordingStore {
        loaded: Vec<Post>,
        load_fails: bool,
        saves: Mutex<Vec<Vec<Post>>>,
    }

    impl RecordingStore {
        fn with_history(texts: &[&str]) -> Self {
            RecordingStore {
                loaded: texts.iter().map(|t| Post::new(*t)).collect(),
                load_fails: false,
                saves: Mutex::new(Vec::new()),
            }
        }

        fn failing_load() -> Self {
            RecordingStore {
                loaded: Vec::new(),
                load_fails: true,
                saves: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HistoryStore for RecordingStore {
        async fn load(&self) -> Result<Vec<Post>, HistoryError> {
            if self.load_fails {
                let malformed = serde_json::from_str::<Vec<Post>>("{ not json").unwrap_err();
                return Err(HistoryError::Malformed(malformed));
            }
            Ok(self.loaded.clone())
        }

        async fn save(&self, posts: &[Post]) -> Result<(), HistoryError> {
            self.saves.lock().unwrap().push(posts.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_happy_path_persists_history_union() {
        let config = test_config(1);
        let provider = PageProvider::serving(vec![Ok(page_with_posts(&[POST_A, POST_B]))]);
        let notifier = RecordingNotifier::new(&[]);
        let store = RecordingStore::with_history(&["an older post from a previous run"]);

        let report = run(&config, &provider, &notifier, &store).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.new, 2);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 0);
        assert!(!report.history_stale);

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(
            saves[0],
            vec![
                Post::new("an older post from a previous run"),
                Post::new(POST_A),
                Post::new(POST_B),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_posts_found_short_circuits() {
        let config = test_config(1);
        let provider = PageProvider::serving(vec![Ok(page_with_posts(&[]))]);
        let notifier = RecordingNotifier::new(&[]);
        let store = RecordingStore::with_history(&[]);

        let report = run(&config, &provider, &notifier, &store).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::NoPostsFound);
        assert!(notifier.delivered.lock().unwrap().is_empty());
        assert!(store.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_new_posts_never_delivers_or_saves() {
        let config = test_config(1);
        let provider = PageProvider::serving(vec![Ok(page_with_posts(&[POST_A, POST_B]))]);
        let notifier = RecordingNotifier::new(&[]);
        let store = RecordingStore::with_history(&[POST_A, POST_B]);

        let report = run(&config, &provider, &notifier, &store).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::NoNewPosts);
        assert_eq!(report.fetched, 2);
        assert_eq!(*notifier.calls.lock().unwrap(), 0);
        assert!(store.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_persists_only_successes() {
        let config = test_config(1);
        let provider = PageProvider::serving(vec![Ok(page_with_posts(&[POST_A, POST_B, POST_C]))]);
        // Second delivery fails.
        let notifier = RecordingNotifier::new(&[1]);
        let store = RecordingStore::with_history(&[]);

        let report = run(&config, &provider, &notifier, &store).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0], vec![Post::new(POST_A), Post::new(POST_C)]);
    }

    #[tokio::test]
    async fn test_all_deliveries_failed_leaves_history_untouched() {
        let config = test_config(1);
        let provider = PageProvider::serving(vec![Ok(page_with_posts(&[POST_A]))]);
        let notifier = RecordingNotifier::new(&[0]);
        let store = RecordingStore::with_history(&[]);

        let report = run(&config, &provider, &notifier, &store).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::AllDeliveriesFailed);
        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 1);
        assert!(store.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_failure_notifies_and_surfaces() {
        let config = test_config(1);
        let provider = PageProvider::failing();
        let notifier = RecordingNotifier::new(&[]);
        let store = RecordingStore::with_history(&[]);

        let err = run(&config, &provider, &notifier, &store).await.unwrap_err();

        assert!(matches!(err, RunError::Session(_)));
        let delivered = notifier.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("Feedwatch run failed"));
        assert!(store.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_notification_failure_is_swallowed() {
        let config = test_config(1);
        let provider = PageProvider::failing();
        // The failure notification itself fails; the run error must still
        // be the session error.
        let notifier = RecordingNotifier::new(&[0]);
        let store = RecordingStore::with_history(&[]);

        let err = run(&config, &provider, &notifier, &store).await.unwrap_err();
        assert!(matches!(err, RunError::Session(_)));
    }

    #[tokio::test]
    async fn test_unreadable_history_aborts_before_delivery() {
        let config = test_config(1);
        let provider = PageProvider::serving(vec![Ok(page_with_posts(&[POST_A]))]);
        let notifier = RecordingNotifier::new(&[]);
        let store = RecordingStore::failing_load();

        let err = run(&config, &provider, &notifier, &store).await.unwrap_err();

        assert!(matches!(err, RunError::History(_)));
        // Only the failure notification went out, never a post.
        let delivered = notifier.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("Feedwatch run failed"));
    }

    #[tokio::test]
    async fn test_save_failure_flags_history_stale() {
        struct SaveFails;

        #[async_trait]
        impl HistoryStore for SaveFails {
            async fn load(&self) -> Result<Vec<Post>, HistoryError> {
                Ok(Vec::new())
            }
            async fn save(&self, _posts: &[Post]) -> Result<(), HistoryError> {
                Err(HistoryError::Io(std::io::Error::other("disk full")))
            }
        }

        let config = test_config(1);
        let provider = PageProvider::serving(vec![Ok(page_with_posts(&[POST_A]))]);
        let notifier = RecordingNotifier::new(&[]);

        let report = run(&config, &provider, &notifier, &SaveFails).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.sent, 1);
        assert!(report.history_stale);
    }
}
