// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use loom_message::{Message, Role};
use loom_provider::StopReason;

use crate::chain::Interceptor;
use crate::context::{InterceptContext, InterceptOutcome};

/// How many trailing messages are scanned when counting consecutive
/// continuations.
const CONTINUATION_WINDOW: usize = 10;

/// Nudges the model to keep generating after it stops on `max_tokens`,
/// capping how many times in a row that can happen.
pub struct MaxTokensInterceptor {
    continue_message: String,
    max_continuations: Option<u32>,
    enabled: bool,
}

impl MaxTokensInterceptor {
    pub fn new(continue_message: impl Into<String>, max_continuations: Option<u32>) -> Self {
        Self { continue_message: continue_message.into(), max_continuations, enabled: true }
    }

    pub fn disabled(continue_message: impl Into<String>) -> Self {
        Self { continue_message: continue_message.into(), max_continuations: None, enabled: false }
    }

    fn is_continue_message(&self, message: &Message) -> bool {
        message.role == Role::User && message.content.len() == 1 && message.as_text().as_deref() == Some(self.continue_message.as_str())
    }

    fn recent_continuation_count(&self, ctx: &InterceptContext<'_>) -> u32 {
        let messages = ctx.conversation.as_slice();
        let start = messages.len().saturating_sub(CONTINUATION_WINDOW);
        messages[start..].iter().filter(|m| self.is_continue_message(m)).count() as u32
    }
}

#[async_trait]
impl Interceptor for MaxTokensInterceptor {
    fn name(&self) -> &str {
        "max-tokens"
    }

    fn description(&self) -> &str {
        "continues the turn when the model stops on max_tokens, up to a cap"
    }

    async fn intercept(&self, ctx: &mut InterceptContext<'_>) -> anyhow::Result<InterceptOutcome> {
        if !self.enabled || ctx.stop_reason != StopReason::MaxTokens {
            return Ok(InterceptOutcome::complete());
        }

        if let Some(cap) = self.max_continuations {
            if self.recent_continuation_count(ctx) >= cap {
                return Ok(InterceptOutcome::complete().with_reasoning("Reached maximum continuations"));
            }
        }

        ctx.conversation.push(Message::user_text(self.continue_message.clone()));
        Ok(InterceptOutcome::cont())
    }
}
