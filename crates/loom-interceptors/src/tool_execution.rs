// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use loom_message::{ContentBlock, ImageSource, Message, Role, ToolResultContent};
use loom_tools::{ExecutionContext, ToolCall, ToolOutput, ToolRegistry, ToolResultPart};

use crate::chain::Interceptor;
use crate::context::{InterceptContext, InterceptOutcome};

/// Approves or rejects a pending tool call. Given `(toolName, parameters)`.
pub type ApprovalCallback = Arc<dyn Fn(String, serde_json::Value) -> BoxFuture<'static, bool> + Send + Sync>;

/// Executes every `tool_use` block in the last assistant message, in
/// parallel, and feeds the results back as a single `tool_result` message.
pub struct ToolExecutionInterceptor {
    registry: Arc<ToolRegistry>,
    approval: Option<ApprovalCallback>,
}

impl ToolExecutionInterceptor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry, approval: None }
    }

    pub fn with_approval(mut self, approval: ApprovalCallback) -> Self {
        self.approval = Some(approval);
        self
    }

    fn pending_tool_calls(ctx: &InterceptContext<'_>) -> Vec<ToolCall> {
        let Some(last) = ctx.conversation.as_slice().last() else {
            return Vec::new();
        };
        if last.role != Role::Assistant {
            return Vec::new();
        }
        last.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { tool_use_id, name, input } => {
                    Some(ToolCall { id: tool_use_id.clone(), name: name.clone(), input: input.clone() })
                }
                _ => None,
            })
            .collect()
    }

    async fn run_one(
        registry: Arc<ToolRegistry>,
        approval: Option<ApprovalCallback>,
        call: ToolCall,
        exec_ctx: ExecutionContext,
        signal: tokio_util::sync::CancellationToken,
        event_subject: loom_events::EventSubject,
    ) -> (String, ToolOutput) {
        if registry.get(&call.name).is_none() {
            return (call.id, ToolOutput::error(format!("unknown tool: {}", call.name)));
        }

        if let Some(approval) = &approval {
            event_subject.emit(loom_events::TaskEvent::ToolUsePendingApproval {
                tool_name: call.name.clone(),
                parameters: call.input.clone(),
            });
            let approved = tokio::select! {
                approved = approval(call.name.clone(), call.input.clone()) => approved,
                _ = signal.cancelled() => false,
            };
            if !approved {
                return (call.id, ToolOutput::error("tool call rejected by approval callback"));
            }
            event_subject.emit(loom_events::TaskEvent::ToolUseApproved { tool_name: call.name.clone() });
        }

        let output = registry.execute(&call, &exec_ctx).await;
        (call.id, output)
    }

    fn translate(tool_use_id: String, output: ToolOutput) -> ContentBlock {
        if output.is_error {
            let payload = serde_json::json!({
                "isError": true,
                "message": output.as_text(),
            });
            return ContentBlock::tool_result(tool_use_id, vec![ToolResultContent::Text { text: payload.to_string() }]);
        }

        if let Some(structured) = &output.structured_content {
            return ContentBlock::tool_result(tool_use_id, vec![ToolResultContent::Text { text: structured.to_string() }]);
        }

        let content = output
            .content
            .into_iter()
            .map(|part| match part {
                ToolResultPart::Text(text) => ToolResultContent::Text { text },
                ToolResultPart::Image(data_url) => match parse_data_url(&data_url) {
                    Some((media_type, data)) => ToolResultContent::Image { source: ImageSource::Base64 { media_type, data } },
                    None => ToolResultContent::Text { text: data_url },
                },
            })
            .collect();
        ContentBlock::tool_result(tool_use_id, content)
    }
}

#[async_trait]
impl Interceptor for ToolExecutionInterceptor {
    fn name(&self) -> &str {
        "tool-execution"
    }

    fn description(&self) -> &str {
        "executes pending tool_use blocks from the last assistant message"
    }

    async fn intercept(&self, ctx: &mut InterceptContext<'_>) -> anyhow::Result<InterceptOutcome> {
        let calls = Self::pending_tool_calls(ctx);
        if calls.is_empty() {
            return Ok(InterceptOutcome::complete());
        }

        let exec_ctx = ExecutionContext { working_directory: ctx.working_directory.clone() };
        let signal = ctx.signal.clone();

        let order: Vec<String> = calls.iter().map(|c| c.id.clone()).collect();
        let mut tasks = Vec::with_capacity(calls.len());
        for call in calls {
            let registry = self.registry.clone();
            let approval = self.approval.clone();
            let exec_ctx = exec_ctx.clone();
            let signal = signal.clone();
            let event_subject = ctx.event_subject.clone();
            event_subject.emit(loom_events::TaskEvent::ToolUse { tool_name: call.name.clone() });
            tasks.push(tokio::spawn(Self::run_one(registry, approval, call, exec_ctx, signal, event_subject)));
        }

        let mut results: std::collections::HashMap<String, ToolOutput> = std::collections::HashMap::with_capacity(order.len());
        for task in tasks {
            match task.await {
                Ok((id, output)) => {
                    results.insert(id, output);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "tool task panicked");
                }
            }
        }

        let blocks: Vec<ContentBlock> = order
            .into_iter()
            .map(|id| {
                let output = results.remove(&id).unwrap_or_else(|| ToolOutput::error("tool panicked"));
                Self::translate(id, output)
            })
            .collect();

        ctx.conversation.push(Message::user(blocks));
        Ok(InterceptOutcome::cont())
    }
}

/// Parses a `data:<mime>;base64,<data>` URL, the shape
/// [`loom_tools::ToolResultPart::Image`] carries.
fn parse_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let media_type = header.strip_suffix(";base64")?;
    Some((media_type.to_string(), data.to_string()))
}
