// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use loom_events::{ConversationProxy, EventSubject};
use loom_provider::{StopReason, ToolSchema};
use tokio_util::sync::CancellationToken;

/// Everything an interceptor sees on a single post-inference call.
pub struct InterceptContext<'a> {
    pub conversation: ConversationProxy<'a>,
    pub last_response_text: Option<String>,
    pub tools: &'a [ToolSchema],
    pub working_directory: PathBuf,
    pub stop_reason: StopReason,
    pub signal: &'a CancellationToken,
    pub event_subject: &'a EventSubject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Complete,
}

/// What an interceptor decided, with optional reasoning text for logs.
#[derive(Debug, Clone)]
pub struct InterceptOutcome {
    pub decision: Decision,
    pub reasoning: Option<String>,
}

impl InterceptOutcome {
    pub fn cont() -> Self {
        Self { decision: Decision::Continue, reasoning: None }
    }

    pub fn complete() -> Self {
        Self { decision: Decision::Complete, reasoning: None }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}
