// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialise history: {0}")]
    Serialization(#[from] serde_json::Error),
}
