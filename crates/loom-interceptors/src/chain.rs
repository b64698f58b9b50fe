// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{Decision, InterceptContext, InterceptOutcome};

/// A chain-of-responsibility participant consulted after each model turn.
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Decide whether the loop continues. An `Err` is logged and treated as
    /// `Complete` for this interceptor only — the remaining chain still runs.
    async fn intercept(&self, ctx: &mut InterceptContext<'_>) -> anyhow::Result<InterceptOutcome>;
}

#[derive(Debug, thiserror::Error)]
pub enum InterceptorChainError {
    #[error("an interceptor named {0:?} is already registered")]
    DuplicateName(String),
}

/// Interceptors run in registration order; the first to return `Continue`
/// claims the turn and short-circuits the rest.
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, interceptor: impl Interceptor + 'static) -> Result<(), InterceptorChainError> {
        let name = interceptor.name().to_string();
        if self.interceptors.iter().any(|i| i.name() == name) {
            return Err(InterceptorChainError::DuplicateName(name));
        }
        self.interceptors.push(Arc::new(interceptor));
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) {
        self.interceptors.retain(|i| i.name() != name);
    }

    pub fn clear(&mut self) {
        self.interceptors.clear();
    }

    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run the chain once. Cancellation is checked between interceptors so
    /// the chain itself is cancellable.
    pub async fn run(&self, ctx: &mut InterceptContext<'_>) -> Decision {
        for interceptor in &self.interceptors {
            if ctx.signal.is_cancelled() {
                return Decision::Complete;
            }
            match interceptor.intercept(ctx).await {
                Ok(outcome) => {
                    if let Some(reasoning) = &outcome.reasoning {
                        tracing::debug!(interceptor = interceptor.name(), reasoning, "interceptor decision");
                    }
                    if outcome.decision == Decision::Continue {
                        return Decision::Continue;
                    }
                }
                Err(e) => {
                    tracing::warn!(interceptor = interceptor.name(), error = %e, "interceptor failed; treating as complete for this interceptor");
                }
            }
        }
        Decision::Complete
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use loom_events::EventSubject;
    use loom_message::Message;
    use loom_provider::StopReason;
    use tokio_util::sync::CancellationToken;

    use super::*;

    struct AlwaysComplete {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Interceptor for AlwaysComplete {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "test"
        }
        async fn intercept(&self, _ctx: &mut InterceptContext<'_>) -> anyhow::Result<InterceptOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(InterceptOutcome::complete())
        }
    }

    struct AlwaysContinue;

    #[async_trait]
    impl Interceptor for AlwaysContinue {
        fn name(&self) -> &str {
            "continue"
        }
        fn description(&self) -> &str {
            "test"
        }
        async fn intercept(&self, _ctx: &mut InterceptContext<'_>) -> anyhow::Result<InterceptOutcome> {
            Ok(InterceptOutcome::cont())
        }
    }

    struct AlwaysErrors;

    #[async_trait]
    impl Interceptor for AlwaysErrors {
        fn name(&self) -> &str {
            "errors"
        }
        fn description(&self) -> &str {
            "test"
        }
        async fn intercept(&self, _ctx: &mut InterceptContext<'_>) -> anyhow::Result<InterceptOutcome> {
            anyhow::bail!("boom")
        }
    }

    fn ctx<'a>(messages: &'a mut Vec<Message>, subject: &'a EventSubject, signal: &'a CancellationToken) -> InterceptContext<'a> {
        InterceptContext {
            conversation: loom_events::ConversationProxy::new(messages, subject),
            last_response_text: None,
            tools: &[],
            working_directory: PathBuf::from("."),
            stop_reason: StopReason::EndTurn,
            signal,
            event_subject: subject,
        }
    }

    #[test]
    fn registering_duplicate_name_fails() {
        let mut chain = InterceptorChain::new();
        chain.register(AlwaysComplete { name: "a", calls: Arc::new(AtomicUsize::new(0)) }).unwrap();
        let err = chain.register(AlwaysComplete { name: "a", calls: Arc::new(AtomicUsize::new(0)) }).unwrap_err();
        assert!(matches!(err, InterceptorChainError::DuplicateName(n) if n == "a"));
    }

    #[tokio::test]
    async fn first_continue_short_circuits_remaining() {
        let mut chain = InterceptorChain::new();
        let calls = Arc::new(AtomicUsize::new(0));
        chain.register(AlwaysContinue).unwrap();
        chain.register(AlwaysComplete { name: "never-reached", calls: calls.clone() }).unwrap();

        let mut messages = Vec::new();
        let subject = EventSubject::new();
        let signal = CancellationToken::new();
        let decision = chain.run(&mut ctx(&mut messages, &subject, &signal)).await;

        assert_eq!(decision, Decision::Continue);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_interceptor_continuing_yields_complete() {
        let mut chain = InterceptorChain::new();
        chain.register(AlwaysComplete { name: "a", calls: Arc::new(AtomicUsize::new(0)) }).unwrap();
        chain.register(AlwaysComplete { name: "b", calls: Arc::new(AtomicUsize::new(0)) }).unwrap();

        let mut messages = Vec::new();
        let subject = EventSubject::new();
        let signal = CancellationToken::new();
        let decision = chain.run(&mut ctx(&mut messages, &subject, &signal)).await;

        assert_eq!(decision, Decision::Complete);
    }

    #[tokio::test]
    async fn an_erroring_interceptor_does_not_block_the_rest() {
        let mut chain = InterceptorChain::new();
        chain.register(AlwaysErrors).unwrap();
        chain.register(AlwaysContinue).unwrap();

        let mut messages = Vec::new();
        let subject = EventSubject::new();
        let signal = CancellationToken::new();
        let decision = chain.run(&mut ctx(&mut messages, &subject, &signal)).await;

        assert_eq!(decision, Decision::Continue);
    }

    #[tokio::test]
    async fn cancelled_signal_stops_the_chain() {
        let mut chain = InterceptorChain::new();
        chain.register(AlwaysContinue).unwrap();

        let mut messages = Vec::new();
        let subject = EventSubject::new();
        let signal = CancellationToken::new();
        signal.cancel();
        let decision = chain.run(&mut ctx(&mut messages, &subject, &signal)).await;

        assert_eq!(decision, Decision::Complete);
    }

    #[test]
    fn unregister_removes_by_name() {
        let mut chain = InterceptorChain::new();
        chain.register(AlwaysComplete { name: "a", calls: Arc::new(AtomicUsize::new(0)) }).unwrap();
        chain.unregister("a");
        assert!(chain.names().is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let mut chain = InterceptorChain::new();
        chain.register(AlwaysComplete { name: "a", calls: Arc::new(AtomicUsize::new(0)) }).unwrap();
        chain.register(AlwaysComplete { name: "b", calls: Arc::new(AtomicUsize::new(0)) }).unwrap();
        chain.clear();
        assert!(chain.names().is_empty());
    }
}
