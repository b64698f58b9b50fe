// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use loom_message::Message;

use crate::error::HistoryError;

/// Pluggable storage for the conversation history an engine resumes from.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn load(&self) -> Result<Vec<Message>, HistoryError>;
    async fn save(&self, messages: &[Message]) -> Result<(), HistoryError>;
    async fn clear(&self) -> Result<(), HistoryError>;
}
