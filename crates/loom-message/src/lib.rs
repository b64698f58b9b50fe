// SPDX-License-Identifier: MIT
//! Message and content-block model shared by every other `loom` crate.
mod conversation;
mod message;

pub use conversation::{validate, ConversationError};
pub use message::{CheckpointLink, ContentBlock, ImageSource, Message, Role, ToolResultContent};
