// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use loom_message::Message;

use crate::error::HistoryError;
use crate::repository::HistoryRepository;

/// Default `HistoryRepository`: a single JSON array rewritten in full on
/// every save. Degrades gracefully rather than failing a task: a missing or
/// unreadable file starts with empty history, and individual entries that
/// fail to deserialise are dropped with a warning instead of discarding the
/// whole file.
pub struct JsonHistoryRepository {
    path: PathBuf,
}

impl JsonHistoryRepository {
    pub fn new(workspace_data_dir: impl Into<PathBuf>) -> Self {
        let mut path = workspace_data_dir.into();
        path.push("history.json");
        Self { path }
    }
}

#[async_trait]
impl HistoryRepository for JsonHistoryRepository {
    async fn load(&self) -> Result<Vec<Message>, HistoryError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "history file unreadable; starting with empty history");
                return Ok(Vec::new());
            }
        };

        let raw: Vec<serde_json::Value> = match serde_json::from_str(&text) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "history file is not valid JSON; starting with empty history");
                return Ok(Vec::new());
            }
        };

        let mut messages = Vec::with_capacity(raw.len());
        for (index, entry) in raw.into_iter().enumerate() {
            match serde_json::from_value::<Message>(entry) {
                Ok(message) => messages.push(message),
                Err(e) => tracing::warn!(index, error = %e, "dropping invalid history entry"),
            }
        }
        Ok(messages)
    }

    async fn save(&self, messages: &[Message]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(messages)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), HistoryError> {
        self.save(&[]).await
    }
}
