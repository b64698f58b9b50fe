// SPDX-License-Identifier: MIT
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a task is already running on this engine")]
    TaskConcurrency,
    #[error("no task is currently running")]
    NoTaskRunning,
    #[error("model provider error: {0}")]
    Provider(#[from] anyhow::Error),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] loom_checkpoint::CheckpointError),
    #[error("history error: {0}")]
    History(#[from] loom_history::HistoryError),
    #[error("background task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}
