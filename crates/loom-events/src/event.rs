// SPDX-License-Identifier: MIT
use loom_message::Message;

/// Why a task's stream ended with `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    User,
    Timeout,
}

/// One item on a task's event stream. Transport-agnostic: the same schema
/// serves a CLI renderer, a TUI, or a websocket bridge.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A text chunk streamed from the model.
    Text { content: String },
    /// A complete message appended to the conversation.
    Message { message: Message },
    /// The model has requested a tool call.
    ToolUse { tool_name: String },
    /// A partial JSON fragment of a tool call's input, as it streams in.
    ToolUseInput { tool_name: String, partial_input: String },
    /// A tool call is awaiting the approval callback's verdict.
    ToolUsePendingApproval { tool_name: String, parameters: serde_json::Value },
    /// The approval callback approved a pending tool call.
    ToolUseApproved { tool_name: String },
    /// The task ended early.
    Cancelled { reason: CancelReason },
}
