// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim into the
    /// `tool_result` block).
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments.
    pub input: Value,
}

/// Everything a tool needs about where it runs, beyond its own arguments.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub working_directory: PathBuf,
}

/// A single content item in a tool result.
#[derive(Debug, Clone)]
pub enum ToolResultPart {
    Text(String),
    /// Base64 data URL: `data:<mime>;base64,<b64>`.
    Image(String),
}

/// What a tool hands back from `execute`.
///
/// A tool may return either a bare string (wrapped here as a single `Text`
/// part) or the richer shape carrying an explicit error flag and optional
/// machine-readable payload. Both forms collapse to this one type so callers
/// never need to match on which was used.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: Vec<ToolResultPart>,
    pub is_error: bool,
    pub structured_content: Option<Value>,
}

impl ToolOutput {
    /// Successful plain-text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![ToolResultPart::Text(text.into())], is_error: false, structured_content: None }
    }

    /// Error result containing a human-readable message.
    pub fn error(text: impl Into<String>) -> Self {
        Self { content: vec![ToolResultPart::Text(text.into())], is_error: true, structured_content: None }
    }

    /// Result with arbitrary parts (text and/or images).
    pub fn with_parts(parts: Vec<ToolResultPart>) -> Self {
        Self { content: parts, is_error: false, structured_content: None }
    }

    pub fn with_structured_content(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    /// Concatenation of all `Text` parts.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ToolResultPart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_images(&self) -> bool {
        self.content.iter().any(|p| matches!(p, ToolResultPart::Image(_)))
    }
}

/// Trait that every tool the engine can dispatch must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's input.
    fn parameters_schema(&self) -> Value;
    /// Execute the tool. Failures are reported through `ToolOutput::error`,
    /// never by returning an `Err` — a failing tool is data fed back to the
    /// model, not an engine-level error.
    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> ToolOutput;
}
