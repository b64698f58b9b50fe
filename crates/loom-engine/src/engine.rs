// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Future, Stream, StreamExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use loom_attachments::{AttachmentCache, CacheEntry};
use loom_checkpoint::CheckpointStore;
use loom_config::EngineConfig;
use loom_events::{CancelReason, ConversationProxy, EventSubject, TaskEvent};
use loom_history::HistoryRepository;
use loom_interceptors::{Decision, InterceptContext, InterceptorChain};
use loom_message::{ContentBlock, Message};
use loom_provider::{CompletionParams, ModelProvider, StreamEvent};
use loom_tools::ToolRegistry;

use crate::error::EngineError;
use crate::options::{SystemPromptLoader, TaskOptions};

/// Multicast stream of [`TaskEvent`]s for a single task.
pub type EventStream = Pin<Box<dyn Stream<Item = TaskEvent> + Send>>;

/// Default max tokens requested per model turn.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Orchestrates one task at a time against a single workspace: stream a
/// model turn, run the interceptor chain, repeat until a `Complete`
/// decision, the iteration cap, a cancellation, or a timeout.
pub struct TaskEngine {
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    interceptors: Arc<InterceptorChain>,
    history: Arc<dyn HistoryRepository>,
    attachments: Arc<AttachmentCache>,
    checkpoints: Option<Arc<AsyncMutex<CheckpointStore>>>,
    system_prompt_loader: Arc<dyn SystemPromptLoader>,
    config: EngineConfig,
    working_directory: PathBuf,

    running: Arc<AtomicBool>,
    messages: AsyncMutex<Option<Vec<Message>>>,
    task_handle: AsyncMutex<Option<JoinHandle<Result<(), EngineError>>>>,
}

impl TaskEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        interceptors: Arc<InterceptorChain>,
        history: Arc<dyn HistoryRepository>,
        attachments: Arc<AttachmentCache>,
        checkpoints: Option<CheckpointStore>,
        system_prompt_loader: Arc<dyn SystemPromptLoader>,
        config: EngineConfig,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model,
            tools,
            interceptors,
            history,
            attachments,
            checkpoints: checkpoints.map(|s| Arc::new(AsyncMutex::new(s))),
            system_prompt_loader,
            config,
            working_directory: working_directory.into(),
            running: Arc::new(AtomicBool::new(false)),
            messages: AsyncMutex::new(None),
            task_handle: AsyncMutex::new(None),
        }
    }

    pub fn is_task_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a task. Fails synchronously, before any suspension, if one is
    /// already in flight.
    pub async fn run_task(
        &self,
        task_description: impl Into<String>,
        model: impl Into<String>,
        file_attachments: Vec<String>,
        options: TaskOptions,
    ) -> Result<EventStream, EngineError> {
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(EngineError::TaskConcurrency);
        }

        let subject = EventSubject::new();
        let external_events = subject.subscribe();

        let prepared = self.prepare_task(task_description.into(), &file_attachments, &subject).await;
        let (messages, attachment_cache) = match prepared {
            Ok(v) => v,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let task = TaskRun {
            model: self.model.clone(),
            tools: self.tools.clone(),
            interceptors: self.interceptors.clone(),
            history: self.history.clone(),
            working_directory: self.working_directory.clone(),
            system_prompt: self.system_prompt_loader.load(),
            attachment_cache,
            messages,
            model_name: model.into(),
            max_iterations: options.max_iterations.unwrap_or(self.config.max_iterations),
            signal: options.signal.unwrap_or_default(),
            deadline: (self.config.task_timeout_ms > 0)
                .then(|| tokio::time::Instant::now() + Duration::from_millis(self.config.task_timeout_ms)),
            subject,
        };

        let running = self.running.clone();
        let handle = tokio::spawn(
            async move {
                let result = task.run().await;
                running.store(false, Ordering::SeqCst);
                result
            }
            .instrument(info_span!("loom_task")),
        );

        *self.task_handle.lock().await = Some(handle);

        let stream = BroadcastStream::new(external_events).filter_map(|item| async move { item.ok() });
        Ok(Box::pin(stream))
    }

    /// Resolves when the in-flight task finishes, propagating its result.
    pub async fn wait(&self) -> Result<(), EngineError> {
        let handle = self.task_handle.lock().await.take();
        match handle {
            Some(handle) => handle.await?,
            None => Err(EngineError::NoTaskRunning),
        }
    }

    /// Restores the workspace to `checkpoint_id` and truncates history to
    /// just before the message that carries it. Returns `false` if no
    /// message in history carries that checkpoint id; the workspace restore
    /// still happens in that case.
    pub async fn apply_checkpoint(&self, checkpoint_id: &str) -> Result<bool, EngineError> {
        let Some(store) = self.checkpoints.clone() else {
            return Ok(false);
        };
        let id = checkpoint_id.to_string();
        tokio::task::spawn_blocking(move || store.blocking_lock().apply_checkpoint(&id)).await??;

        let mut guard = self.messages.lock().await;
        let messages = guard.get_or_insert_with(Vec::new);
        let found = messages
            .iter()
            .position(|m| m.checkpoint.as_ref().map(|c| c.checkpoint_id.as_str()) == Some(checkpoint_id));
        match found {
            Some(idx) => {
                messages.truncate(idx);
                self.history.save(messages).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pre-task setup: reload the system prompt (read by the caller
    /// separately), load history if not already loaded, create a checkpoint
    /// and link it to the new user message, materialize attachments.
    async fn prepare_task(
        &self,
        task_description: String,
        file_attachments: &[String],
        subject: &EventSubject,
    ) -> Result<(Vec<Message>, HashMap<String, CacheEntry>), EngineError> {
        let mut guard = self.messages.lock().await;
        if guard.is_none() {
            *guard = Some(self.history.load().await?);
        }
        let messages = guard.get_or_insert_with(Vec::new);

        let mut user_message = Message::user(user_message_content(&task_description, file_attachments));

        if let Some(store) = &self.checkpoints {
            let name = format!("Before task: {}", truncate_chars(&task_description, 50));
            let store = store.clone();
            let checkpoint_id = tokio::task::spawn_blocking(move || store.blocking_lock().create_checkpoint(&name)).await??;
            user_message = user_message.with_checkpoint(checkpoint_id);
        }

        ConversationProxy::new(messages, subject).push(user_message);
        let attachment_cache = self.attachments.cache_message_file_attachments(messages.as_slice()).await;

        Ok((messages.clone(), attachment_cache))
    }
}

fn user_message_content(task_description: &str, file_attachments: &[String]) -> Vec<ContentBlock> {
    let mut content = vec![ContentBlock::text(task_description)];
    for file_id in file_attachments {
        content.push(ContentBlock::FileAttachment { file_id: file_id.clone(), mime_type: "application/octet-stream".into() });
    }
    content
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Owns everything one spawned task-loop body needs, decoupled from
/// `&TaskEngine` so it can live in its own `'static` `tokio::spawn`ed task.
struct TaskRun {
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    interceptors: Arc<InterceptorChain>,
    history: Arc<dyn HistoryRepository>,
    working_directory: PathBuf,
    system_prompt: String,
    attachment_cache: HashMap<String, CacheEntry>,
    messages: Vec<Message>,
    model_name: String,
    max_iterations: u32,
    signal: CancellationToken,
    deadline: Option<tokio::time::Instant>,
    subject: EventSubject,
}

enum IterationRace<T> {
    Aborted(CancelReason),
    Completed(T),
}

async fn race<F: Future>(signal: &CancellationToken, deadline: Option<tokio::time::Instant>, fut: F) -> IterationRace<F::Output> {
    let timeout = async {
        match deadline {
            Some(dl) => tokio::time::sleep_until(dl).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        biased;
        _ = signal.cancelled() => IterationRace::Aborted(CancelReason::User),
        _ = timeout => IterationRace::Aborted(CancelReason::Timeout),
        out = fut => IterationRace::Completed(out),
    }
}

impl TaskRun {
    async fn run(mut self) -> Result<(), EngineError> {
        let tool_schemas: Vec<loom_provider::ToolSchema> = self
            .tools
            .schemas()
            .into_iter()
            .map(|s| loom_provider::ToolSchema { name: s.name, description: s.description, parameters: s.parameters })
            .collect();

        let mut iterations = 0u32;

        let outcome = loop {
            if iterations >= self.max_iterations {
                break Ok(());
            }

            match race(&self.signal, self.deadline, self.run_one_iteration(&tool_schemas)).await {
                IterationRace::Aborted(reason) => {
                    self.subject.emit(TaskEvent::Cancelled { reason });
                    break Ok(());
                }
                IterationRace::Completed(Err(e)) => break Err(e),
                IterationRace::Completed(Ok(Decision::Continue)) => iterations += 1,
                IterationRace::Completed(Ok(Decision::Complete)) => break Ok(()),
            }
        };

        self.history.save(&self.messages).await?;
        outcome
    }

    async fn run_one_iteration(&mut self, tool_schemas: &[loom_provider::ToolSchema]) -> Result<Decision, EngineError> {
        let params = CompletionParams {
            model: self.model_name.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system: self.system_prompt.clone(),
            messages: self.messages.clone(),
            tools: tool_schemas.to_vec(),
            user_id: None,
        };

        let mut chat_stream = self.model.stream_chat(params, Some(&self.attachment_cache)).await.map_err(EngineError::Provider)?;
        let mut last_response_text = String::new();

        while let Some(event) = chat_stream.events.next().await {
            match event {
                StreamEvent::Text { content } => {
                    last_response_text.push_str(&content);
                    self.subject.emit(TaskEvent::Text { content });
                }
                StreamEvent::Message { message } => {
                    self.subject.emit(TaskEvent::Message { message });
                }
            }
        }

        let final_message = chat_stream.final_message().await.map_err(EngineError::Provider)?;
        let stop_reason = final_message.stop_reason;

        {
            let mut proxy = ConversationProxy::new(&mut self.messages, &self.subject);
            proxy.push(Message::assistant(final_message.content));
        }

        let mut ctx = InterceptContext {
            conversation: ConversationProxy::new(&mut self.messages, &self.subject),
            last_response_text: Some(last_response_text),
            tools: tool_schemas,
            working_directory: self.working_directory.clone(),
            stop_reason,
            signal: &self.signal,
            event_subject: &self.subject,
        };

        let decision = self.interceptors.run(&mut ctx).await;
        debug!(?decision, "interceptor chain decided");
        Ok(decision)
    }
}
