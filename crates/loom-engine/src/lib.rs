// SPDX-License-Identifier: MIT
//! Orchestrates a single in-flight task against a workspace: streams model
//! turns through the interceptor chain, persists history, and brokers
//! checkpoint rollback.
mod engine;
mod error;
mod options;

pub use engine::{EventStream, TaskEngine};
pub use error::EngineError;
pub use options::{StaticSystemPromptLoader, SystemPromptLoader, TaskOptions};
