// SPDX-License-Identifier: MIT
use std::collections::HashSet;

use thiserror::Error;

use crate::message::{ContentBlock, Message};

/// Errors describing a conversation invariant violation.
///
/// These are assertions, not recoverable runtime conditions: a well-behaved
/// engine never produces a conversation that fails [`validate`]. Callers
/// that build message lists from untrusted input (e.g. a restored history
/// file) should run validation and treat a failure as corrupt state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool_result {tool_use_id:?} has no preceding tool_use with the same id")]
    DanglingToolResult { tool_use_id: String },
    #[error("timestamps are not monotonically non-decreasing at index {index}")]
    TimestampWentBackwards { index: usize },
}

/// Validate the invariants a conversation must uphold:
///
/// - every `tool_result.tool_use_id` has an earlier `tool_use` with that id
/// - timestamps are non-decreasing in insertion order
///
/// A message carrying at most one checkpoint link is enforced structurally
/// by [`Message`] holding a single `Option<CheckpointLink>` rather than
/// checked here.
pub fn validate(messages: &[Message]) -> Result<(), ConversationError> {
    let mut seen_tool_use_ids: HashSet<&str> = HashSet::new();
    let mut last_timestamp = None;

    for (index, message) in messages.iter().enumerate() {
        if let Some(ts) = last_timestamp {
            if message.timestamp < ts {
                return Err(ConversationError::TimestampWentBackwards { index });
            }
        }
        last_timestamp = Some(message.timestamp);

        for block in &message.content {
            match block {
                ContentBlock::ToolUse { tool_use_id, .. } => {
                    seen_tool_use_ids.insert(tool_use_id.as_str());
                }
                ContentBlock::ToolResult { tool_use_id, .. } => {
                    if !seen_tool_use_ids.contains(tool_use_id.as_str()) {
                        return Err(ConversationError::DanglingToolResult {
                            tool_use_id: tool_use_id.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentBlock;

    #[test]
    fn empty_conversation_is_valid() {
        assert!(validate(&[]).is_ok());
    }

    #[test]
    fn tool_result_after_matching_tool_use_is_valid() {
        let messages = vec![
            Message::assistant(vec![ContentBlock::tool_use("u1", "echo", serde_json::json!({}))]),
            Message::user(vec![ContentBlock::tool_result(
                "u1",
                vec![crate::message::ToolResultContent::Text { text: "1".into() }],
            )]),
        ];
        assert!(validate(&messages).is_ok());
    }

    #[test]
    fn tool_result_without_prior_tool_use_is_dangling() {
        let messages = vec![Message::user(vec![ContentBlock::tool_result(
            "missing",
            vec![crate::message::ToolResultContent::Text { text: "x".into() }],
        )])];
        assert_eq!(
            validate(&messages),
            Err(ConversationError::DanglingToolResult { tool_use_id: "missing".into() })
        );
    }

    #[test]
    fn timestamps_must_not_go_backwards() {
        let mut first = Message::user_text("first");
        let mut second = Message::user_text("second");
        first.timestamp = chrono::Utc::now();
        second.timestamp = first.timestamp - chrono::Duration::seconds(1);
        let messages = vec![first, second];
        assert_eq!(validate(&messages), Err(ConversationError::TimestampWentBackwards { index: 1 }));
    }
}
