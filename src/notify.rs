//! Telegram delivery with exponential backoff retry logic.
//!
//! This module provides the outbound notification channel. It uses a
//! trait-based design for flexibility:
//! - [`Notifier`]: core trait defining message delivery
//! - [`TelegramNotifier`]: posts to the Telegram Bot API `sendMessage` method
//! - [`RetryNotifier`]: decorator that adds retry logic to any `Notifier`
//!
//! # Retry Strategy
//!
//! - Exponential backoff starting at the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//!
//! Retries paper over transient transport errors and Telegram's own 429
//! responses; a post whose retries are exhausted is reported failed to the
//! delivery pipeline, which carries on with the remaining posts.

use crate::error::DeliveryError;
use async_trait::async_trait;
use rand::{rng, Rng};
use serde::Deserialize;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Public Telegram Bot API host; overridable for tests.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Trait for async message delivery.
///
/// Implementors send one text message to the notification channel. The text
/// is already truncated to the channel ceiling by the delivery pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Notifier backed by the Telegram Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramErrorBody {
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        TelegramNotifier {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    /// Point the notifier at a different API host. Used by tests.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(level = "debug", skip_all)]
    async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let description = match resp.json::<TelegramErrorBody>().await {
                Ok(body) => body.description.unwrap_or_else(|| "no description".to_string()),
                Err(_) => "no description".to_string(),
            };
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                description,
            });
        }

        debug!(chars = text.chars().count(), "Message sent to Telegram");
        Ok(())
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Notifier`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryNotifier<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryNotifier<T>
where
    T: Notifier,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        RetryNotifier {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryNotifier")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> Notifier for RetryNotifier<T>
where
    T: Notifier,
{
    #[instrument(level = "debug", skip_all)]
    async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.deliver(text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "deliver() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "deliver() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
