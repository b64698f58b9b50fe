// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use loom_attachments::CacheEntry;
use loom_message::{ContentBlock, Role};

use crate::provider::{ChatStream, ModelProvider};
use crate::types::{CompletionParams, FinalMessage, StopReason, StreamEvent};

/// Deterministic mock: echoes the last user message's text back as the
/// assistant response with `stop_reason = EndTurn`.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl ModelProvider for MockProvider {
    async fn stream_chat(
        &self,
        params: CompletionParams,
        _attachment_cache: Option<&HashMap<String, CacheEntry>>,
    ) -> anyhow::Result<ChatStream> {
        let reply = params
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.as_text())
            .unwrap_or_else(|| "[no input]".to_string());

        let text = format!("MOCK: {reply}");
        let events = stream::iter(vec![StreamEvent::Text { content: text.clone() }]);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _ = tx.send(FinalMessage {
            content: vec![ContentBlock::text(text)],
            stop_reason: StopReason::EndTurn,
        });
        Ok(ChatStream::new(Box::pin(events), rx))
    }
}

/// One scripted model turn: the deltas to emit and the final message they
/// resolve to.
#[derive(Clone)]
pub struct ScriptedTurn {
    pub events: Vec<StreamEvent>,
    pub final_message: FinalMessage,
}

/// A provider driven entirely by a pre-scripted sequence of turns. Each call
/// to `stream_chat` pops the next script from the front of the queue so
/// tests can specify exact event sequences — including tool calls and
/// `max_tokens` truncation — without network access.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<ScriptedTurn>>>,
    /// The last `CompletionParams` seen, so tests can inspect what was sent.
    pub last_request: Arc<Mutex<Option<CompletionParams>>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<ScriptedTurn>) -> Self {
        Self { scripts: Arc::new(Mutex::new(scripts)), last_request: Arc::new(Mutex::new(None)) }
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    async fn stream_chat(
        &self,
        params: CompletionParams,
        _attachment_cache: Option<&HashMap<String, CacheEntry>>,
    ) -> anyhow::Result<ChatStream> {
        *self.last_request.lock().unwrap() = Some(params);

        let turn = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                anyhow::bail!("ScriptedMockProvider: no more scripted turns");
            }
            scripts.remove(0)
        };

        let events = stream::iter(turn.events);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _ = tx.send(turn.final_message);
        Ok(ChatStream::new(Box::pin(events), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_echoes_last_user_message() {
        let provider = MockProvider;
        let params = CompletionParams {
            model: "mock".into(),
            max_tokens: 100,
            system: String::new(),
            messages: vec![loom_message::Message::user_text("hello")],
            tools: vec![],
            user_id: None,
        };
        let stream = provider.stream_chat(params, None).await.unwrap();
        let msg = stream.final_message().await.unwrap();
        assert_eq!(msg.stop_reason, StopReason::EndTurn);
        assert_eq!(msg.content[0].as_text(), Some("MOCK: hello"));
    }

    #[tokio::test]
    async fn scripted_mock_pops_turns_in_order() {
        let turn1 = ScriptedTurn {
            events: vec![StreamEvent::Text { content: "a".into() }],
            final_message: FinalMessage { content: vec![ContentBlock::text("a")], stop_reason: StopReason::EndTurn },
        };
        let turn2 = ScriptedTurn {
            events: vec![StreamEvent::Text { content: "b".into() }],
            final_message: FinalMessage { content: vec![ContentBlock::text("b")], stop_reason: StopReason::EndTurn },
        };
        let provider = ScriptedMockProvider::new(vec![turn1, turn2]);

        let params = CompletionParams {
            model: "mock".into(),
            max_tokens: 100,
            system: String::new(),
            messages: vec![],
            tools: vec![],
            user_id: None,
        };
        let first = provider.stream_chat(params.clone(), None).await.unwrap();
        assert_eq!(first.final_message().await.unwrap().content[0].as_text(), Some("a"));

        let second = provider.stream_chat(params, None).await.unwrap();
        assert_eq!(second.final_message().await.unwrap().content[0].as_text(), Some("b"));
    }

    #[tokio::test]
    async fn scripted_mock_errors_when_exhausted() {
        let provider = ScriptedMockProvider::new(vec![]);
        let params = CompletionParams {
            model: "mock".into(),
            max_tokens: 100,
            system: String::new(),
            messages: vec![],
            tools: vec![],
            user_id: None,
        };
        assert!(provider.stream_chat(params, None).await.is_err());
    }
}
