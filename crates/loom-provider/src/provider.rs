// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::oneshot;

use loom_attachments::CacheEntry;

use crate::types::{CompletionParams, FinalMessage, StreamEvent};

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A single streamed turn: deltas arrive over `events`, and the complete
/// assistant message becomes available once streaming finishes.
pub struct ChatStream {
    pub events: EventStream,
    final_message_rx: oneshot::Receiver<FinalMessage>,
}

impl ChatStream {
    pub fn new(events: EventStream, final_message_rx: oneshot::Receiver<FinalMessage>) -> Self {
        Self { events, final_message_rx }
    }

    /// Await the complete assistant message. Must be called after fully
    /// draining `events` (providers send it once the stream is exhausted).
    pub async fn final_message(self) -> anyhow::Result<FinalMessage> {
        self.final_message_rx
            .await
            .map_err(|_| anyhow::anyhow!("model provider dropped without producing a final message"))
    }
}

/// External collaborator that turns a conversation into a streamed model turn.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn stream_chat(
        &self,
        params: CompletionParams,
        attachment_cache: Option<&HashMap<String, CacheEntry>>,
    ) -> anyhow::Result<ChatStream>;
}
