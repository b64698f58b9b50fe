// SPDX-License-Identifier: MIT
//! The model provider boundary: turns a conversation into a streamed model
//! turn. Concrete providers (Anthropic, OpenAI, ...) live outside this crate;
//! it ships only the trait and deterministic mocks for tests.
mod mock;
mod provider;
mod types;

pub use mock::{MockProvider, ScriptedMockProvider, ScriptedTurn};
pub use provider::{ChatStream, EventStream, ModelProvider};
pub use types::{CompletionParams, FinalMessage, StopReason, StreamEvent, ToolSchema};
