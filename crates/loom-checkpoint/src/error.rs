// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint git error: {0}")]
    Git(#[from] git2::Error),
    #[error("checkpoint not found: {0}")]
    NotFound(String),
}
