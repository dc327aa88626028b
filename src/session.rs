//! Authenticated browsing sessions against the source site.
//!
//! The browser automation itself lives in a separate headless-browser
//! gateway service; this module is only the HTTP client for it, behind two
//! seams the rest of the pipeline depends on:
//!
//! - [`SessionProvider`]: logs in and hands out one authenticated session
//! - [`BrowsingSession`]: navigate-and-render, screenshot, close
//!
//! The gateway keeps the real browser, cookies and login state server-side
//! for the lifetime of a session:
//!
//! ```text
//! POST   {base}/session                      credentials -> { "session_id" }
//! POST   {base}/session/{id}/navigate        { url, wait_for } -> rendered HTML
//! POST   {base}/session/{id}/screenshot      -> PNG bytes
//! DELETE {base}/session/{id}
//! ```
//!
//! Session creation failing is fatal for the whole run; navigation failures
//! are per-target and recovered by the fetcher.

use crate::config::{Credentials, GatewayConfig};
use crate::error::{NavigationError, SessionError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};

#[async_trait]
pub trait BrowsingSession: Send + std::fmt::Debug {
    /// Navigate to `url`, wait for the results markup to render, and return
    /// the page HTML.
    async fn fetch_page(&mut self, url: &str) -> Result<String, NavigationError>;

    /// Capture the current viewport for debugging. Sessions that cannot
    /// screenshot return `Ok(None)`.
    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>, NavigationError> {
        Ok(None)
    }

    /// Release the underlying browser resources.
    async fn close(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Establish an authenticated session, or fail the run.
    async fn create_session(&self) -> Result<Box<dyn BrowsingSession>, SessionError>;
}

/// HTTP client for the headless-browser gateway.
pub struct RemoteBrowser {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    credentials: Credentials,
    wait_for: String,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: String,
}

impl RemoteBrowser {
    pub fn new(gateway: &GatewayConfig, credentials: Credentials, wait_for: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(gateway.navigation_timeout)
            .build()
            .expect("Failed to build HTTP client");

        RemoteBrowser {
            client,
            base_url: gateway.base_url.trim_end_matches('/').to_string(),
            token: gateway.token.clone(),
            credentials,
            wait_for: wait_for.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        if let Some(ref token) = self.token {
            url.push_str(&format!("?token={token}"));
        }
        url
    }
}

#[async_trait]
impl SessionProvider for RemoteBrowser {
    #[instrument(level = "info", skip_all)]
    async fn create_session(&self) -> Result<Box<dyn BrowsingSession>, SessionError> {
        let body = serde_json::json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });

        let resp = self
            .client
            .post(self.endpoint("/session"))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let message = resp.text().await.unwrap_or_default();
            return Err(SessionError::Auth(message));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SessionError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreateSessionResponse =
            resp.json().await.map_err(SessionError::Transport)?;
        info!(session_id = %created.session_id, "Browsing session established");

        Ok(Box::new(RemoteBrowserSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            wait_for: self.wait_for.clone(),
            id: created.session_id,
        }))
    }
}

/// One live session on the gateway. Owned exclusively by a single fetcher
/// invocation and closed exactly once.
#[derive(Debug)]
pub struct RemoteBrowserSession {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    wait_for: String,
    id: String,
}

impl RemoteBrowserSession {
    fn endpoint(&self, path: &str) -> String {
        let mut url = format!("{}/session/{}{}", self.base_url, self.id, path);
        if let Some(ref token) = self.token {
            url.push_str(&format!("?token={token}"));
        }
        url
    }
}

#[async_trait]
impl BrowsingSession for RemoteBrowserSession {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_page(&mut self, url: &str) -> Result<String, NavigationError> {
        let body = serde_json::json!({
            "url": url,
            "wait_for": self.wait_for,
        });

        let resp = self
            .client
            .post(self.endpoint("/navigate"))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(NavigationError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        let html = resp.text().await?;
        debug!(bytes = html.len(), "Fetched rendered page");
        Ok(html)
    }

    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>, NavigationError> {
        let resp = self
            .client
            .post(self.endpoint("/screenshot"))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(NavigationError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    #[instrument(level = "info", skip_all, fields(session_id = %self.id))]
    async fn close(&mut self) -> Result<(), SessionError> {
        let resp = self
            .client
            .delete(self.endpoint(""))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SessionError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        info!("Browsing session closed");
        Ok(())
    }
}
