// SPDX-License-Identifier: MIT
//! The tool boundary: register, look up, and dispatch tool calls. Concrete
//! tools (file I/O, shell, browser, ...) live outside this crate.
mod registry;
mod tool;

pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{ExecutionContext, Tool, ToolCall, ToolOutput, ToolResultPart};
