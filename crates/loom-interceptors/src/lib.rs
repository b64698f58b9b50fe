// SPDX-License-Identifier: MIT
//! Chain-of-responsibility interceptors consulted after each model turn to
//! decide whether the task loop continues.
mod chain;
mod context;
mod max_tokens;
mod tool_execution;

pub use chain::{Interceptor, InterceptorChain, InterceptorChainError};
pub use context::{Decision, InterceptContext, InterceptOutcome};
pub use max_tokens::MaxTokensInterceptor;
pub use tool_execution::{ApprovalCallback, ToolExecutionInterceptor};
