// SPDX-License-Identifier: MIT
//! Pluggable persistence for the conversation an engine resumes from.
mod error;
mod json_repository;
mod repository;

pub use error::HistoryError;
pub use json_repository::JsonHistoryRepository;
pub use repository::HistoryRepository;
