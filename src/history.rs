//! Persistence of the delivered-post history.
//!
//! The history is the only durable artifact the bot owns: a single JSON
//! array of post strings, read once at the start of a run and rewritten in
//! full when at least one delivery succeeded. The caller constructs the
//! union; `save` is a whole-file overwrite, never an append.

use crate::error::HistoryError;
use crate::models::Post;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load previously delivered posts. A missing artifact is the normal
    /// first-run case and loads as empty.
    async fn load(&self) -> Result<Vec<Post>, HistoryError>;

    /// Overwrite the artifact with the full updated history.
    async fn save(&self, posts: &[Post]) -> Result<(), HistoryError>;
}

/// History stored as a pretty-printed JSON string array on disk.
pub struct JsonFileHistory {
    path: PathBuf,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileHistory { path: path.into() }
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistory {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Vec<Post>, HistoryError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No history file yet; starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(HistoryError::Io(e)),
        };

        let posts: Vec<Post> = serde_json::from_str(&raw)?;
        info!(count = posts.len(), "Loaded delivery history");
        Ok(posts)
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = posts.len()))]
    async fn save(&self, posts: &[Post]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(posts)?;
        fs::write(&self.path, json).await?;
        info!("Wrote delivery history");
        Ok(())
    }
}
