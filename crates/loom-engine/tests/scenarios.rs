// SPDX-License-Identifier: MIT
//! End-to-end scenarios driving a real `TaskEngine` against scripted model
//! turns: no network, no filesystem beyond a temp directory per test.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use loom_attachments::AttachmentCache;
use loom_checkpoint::CheckpointStore;
use loom_config::EngineConfig;
use loom_engine::{StaticSystemPromptLoader, TaskEngine, TaskOptions};
use loom_events::{CancelReason, TaskEvent};
use loom_history::JsonHistoryRepository;
use loom_interceptors::{InterceptorChain, MaxTokensInterceptor, ToolExecutionInterceptor};
use loom_message::ContentBlock;
use loom_provider::{ChatStream, CompletionParams, FinalMessage, ModelProvider, ScriptedMockProvider, ScriptedTurn, StopReason, StreamEvent};
use loom_tools::{ExecutionContext, Tool, ToolOutput, ToolRegistry};

struct RecordingTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        "record"
    }
    fn description(&self) -> &str {
        "increments a counter and echoes its input"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object" })
    }
    async fn execute(&self, input: serde_json::Value, _ctx: &ExecutionContext) -> ToolOutput {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ToolOutput::text(format!("recorded {input}"))
    }
}

fn chain_with_tools(tools: Arc<ToolRegistry>) -> Arc<InterceptorChain> {
    let mut chain = InterceptorChain::new();
    chain.register(ToolExecutionInterceptor::new(tools)).unwrap();
    chain.register(MaxTokensInterceptor::disabled("Continue")).unwrap();
    Arc::new(chain)
}

fn engine_config(root: &std::path::Path) -> EngineConfig {
    EngineConfig::new(root.join("data"))
}

async fn build_engine(
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    root: &std::path::Path,
    config: EngineConfig,
    checkpoints: Option<CheckpointStore>,
) -> TaskEngine {
    let history = Arc::new(JsonHistoryRepository::new(config.workspace_data_dir.clone()));
    let attachments = Arc::new(AttachmentCache::new(config.cache_dir.clone(), None));
    let interceptors = chain_with_tools(tools.clone());
    let prompt = Arc::new(StaticSystemPromptLoader::new("you are a test agent"));
    TaskEngine::new(provider, tools, interceptors, history, attachments, checkpoints, prompt, config, root.to_path_buf())
}

fn text_turn(text: &str, stop_reason: StopReason) -> ScriptedTurn {
    ScriptedTurn {
        events: vec![StreamEvent::Text { content: text.to_string() }],
        final_message: FinalMessage { content: vec![ContentBlock::text(text)], stop_reason },
    }
}

#[tokio::test]
async fn text_only_turn_completes_after_one_round() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedMockProvider::new(vec![text_turn("hi there", StopReason::EndTurn)]));
    let tools = Arc::new(ToolRegistry::new());
    let config = engine_config(dir.path());
    let engine = build_engine(provider, tools, dir.path(), config, None).await;

    let mut events = engine.run_task("Say hi", "mock-model", vec![], TaskOptions::default()).await.unwrap();

    let first = events.next().await.unwrap();
    match first {
        TaskEvent::Message { message } => assert_eq!(message.as_text().as_deref(), Some("Say hi")),
        other => panic!("expected the user message first, got {other:?}"),
    }

    let mut saw_text = false;
    let mut saw_final_assistant_message = false;
    while let Some(event) = events.next().await {
        match event {
            TaskEvent::Text { content } => {
                assert_eq!(content, "hi there");
                saw_text = true;
            }
            TaskEvent::Message { message } => {
                assert_eq!(message.as_text().as_deref(), Some("hi there"));
                saw_final_assistant_message = true;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(saw_text && saw_final_assistant_message);

    engine.wait().await.unwrap();
    assert!(!engine.is_task_running());
}

#[tokio::test]
async fn single_tool_round_trip_executes_then_completes() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let tool_turn = ScriptedTurn {
        events: vec![],
        final_message: FinalMessage {
            content: vec![ContentBlock::tool_use("call-1", "record", json!({"n": 1}))],
            stop_reason: StopReason::ToolUse,
        },
    };
    let provider = Arc::new(ScriptedMockProvider::new(vec![tool_turn, text_turn("done", StopReason::EndTurn)]));

    let mut tools = ToolRegistry::new();
    tools.register(RecordingTool { calls: calls.clone() });
    let tools = Arc::new(tools);

    let config = engine_config(dir.path());
    let engine = build_engine(provider, tools, dir.path(), config, None).await;

    let mut events = engine.run_task("use the tool", "mock-model", vec![], TaskOptions::default()).await.unwrap();
    while events.next().await.is_some() {}
    engine.wait().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancellation_before_streaming_emits_cancelled_event() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedMockProvider::new(vec![text_turn("never seen", StopReason::EndTurn)]));
    let tools = Arc::new(ToolRegistry::new());
    let config = engine_config(dir.path());
    let engine = build_engine(provider, tools, dir.path(), config, None).await;

    let signal = CancellationToken::new();
    signal.cancel();
    let options = TaskOptions { max_iterations: None, signal: Some(signal) };

    let mut events = engine.run_task("won't finish", "mock-model", vec![], options).await.unwrap();
    let mut saw_cancelled = false;
    while let Some(event) = events.next().await {
        if let TaskEvent::Cancelled { reason } = event {
            assert_eq!(reason, CancelReason::User);
            saw_cancelled = true;
        }
    }
    assert!(saw_cancelled);
    engine.wait().await.unwrap();
}

/// Wraps a provider with an artificial delay before it yields its turn, so a
/// short `task_timeout_ms` can race against it deterministically.
struct SlowProvider {
    inner: ScriptedMockProvider,
    delay: Duration,
}

#[async_trait]
impl ModelProvider for SlowProvider {
    async fn stream_chat(
        &self,
        params: CompletionParams,
        attachment_cache: Option<&std::collections::HashMap<String, loom_attachments::CacheEntry>>,
    ) -> anyhow::Result<ChatStream> {
        tokio::time::sleep(self.delay).await;
        self.inner.stream_chat(params, attachment_cache).await
    }
}

#[tokio::test]
async fn task_timeout_emits_cancelled_event() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(SlowProvider {
        inner: ScriptedMockProvider::new(vec![text_turn("too slow", StopReason::EndTurn)]),
        delay: Duration::from_millis(200),
    });
    let tools = Arc::new(ToolRegistry::new());
    let mut config = engine_config(dir.path());
    config.task_timeout_ms = 10;
    let engine = build_engine(provider, tools, dir.path(), config, None).await;

    let mut events = engine.run_task("take too long", "mock-model", vec![], TaskOptions::default()).await.unwrap();
    let mut saw_timeout = false;
    while let Some(event) = events.next().await {
        if let TaskEvent::Cancelled { reason } = event {
            assert_eq!(reason, CancelReason::Timeout);
            saw_timeout = true;
        }
    }
    assert!(saw_timeout);
    engine.wait().await.unwrap();
}

#[tokio::test]
async fn checkpoint_rollback_restores_workspace_and_truncates_history() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("file.txt"), "before").unwrap();

    let checkpoints = CheckpointStore::open(workspace.clone(), dir.path().join("checkpoints")).unwrap();

    let provider = Arc::new(ScriptedMockProvider::new(vec![text_turn("made a change", StopReason::EndTurn)]));
    let tools = Arc::new(ToolRegistry::new());
    let config = engine_config(dir.path());
    let history_dir = config.workspace_data_dir.clone();
    let engine = build_engine(provider, tools, &workspace, config, Some(checkpoints)).await;

    let mut events = engine.run_task("edit the file", "mock-model", vec![], TaskOptions::default()).await.unwrap();
    while events.next().await.is_some() {}
    engine.wait().await.unwrap();

    std::fs::write(workspace.join("file.txt"), "after").unwrap();

    let history = JsonHistoryRepository::new(history_dir);
    let messages = history.load().await.unwrap();
    let checkpoint_id = messages.iter().find_map(|m| m.checkpoint.as_ref()).map(|c| c.checkpoint_id.clone()).unwrap();

    let truncated = engine.apply_checkpoint(&checkpoint_id).await.unwrap();
    assert!(truncated);
    assert_eq!(std::fs::read_to_string(workspace.join("file.txt")).unwrap(), "before");
}

#[tokio::test]
async fn max_tokens_continuation_respects_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        text_turn("truncated once", StopReason::MaxTokens),
        text_turn("truncated twice", StopReason::MaxTokens),
    ]));
    let tools = Arc::new(ToolRegistry::new());
    let config = engine_config(dir.path());

    let history = Arc::new(JsonHistoryRepository::new(config.workspace_data_dir.clone()));
    let attachments = Arc::new(AttachmentCache::new(config.cache_dir.clone(), None));
    let mut chain = InterceptorChain::new();
    chain.register(ToolExecutionInterceptor::new(Arc::new(ToolRegistry::new()))).unwrap();
    chain.register(MaxTokensInterceptor::new("Continue", Some(1))).unwrap();
    let prompt = Arc::new(StaticSystemPromptLoader::new("you are a test agent"));

    let engine = TaskEngine::new(provider, tools, Arc::new(chain), history, attachments, None, prompt, config, dir.path().to_path_buf());

    let mut events = engine.run_task("keep going", "mock-model", vec![], TaskOptions::default()).await.unwrap();
    let mut continue_messages = 0;
    while let Some(event) = events.next().await {
        if let TaskEvent::Message { message } = event {
            if message.as_text().as_deref() == Some("Continue") {
                continue_messages += 1;
            }
        }
    }
    engine.wait().await.unwrap();
    assert_eq!(continue_messages, 1);
}
