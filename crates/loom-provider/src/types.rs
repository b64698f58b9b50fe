// SPDX-License-Identifier: MIT
use loom_message::{ContentBlock, Message};

/// A tool schema handed to the model alongside the conversation.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Everything needed to ask the model for its next turn.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub user_id: Option<String>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

/// The assistant's complete turn, available once streaming finishes.
#[derive(Debug, Clone)]
pub struct FinalMessage {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

/// One item yielded while a turn streams in.
///
/// `Message` is rare: most turns only ever emit `Text` deltas followed by the
/// engine appending the `FinalMessage` itself, but some providers interleave
/// an intermediate fully-formed message (e.g. a tool-use block arriving
/// whole rather than as deltas).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Text { content: String },
    Message { message: Message },
}
