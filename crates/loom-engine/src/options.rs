// SPDX-License-Identifier: MIT
use tokio_util::sync::CancellationToken;

/// Per-call overrides for [`crate::TaskEngine::run_task`].
#[derive(Default)]
pub struct TaskOptions {
    pub max_iterations: Option<u32>,
    pub signal: Option<CancellationToken>,
}

/// Reloaded once at the start of every task, mirroring the teacher's
/// per-submit `system_message` recomputation.
pub trait SystemPromptLoader: Send + Sync {
    fn load(&self) -> String;
}

/// A loader that always returns the same prompt.
pub struct StaticSystemPromptLoader(String);

impl StaticSystemPromptLoader {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self(prompt.into())
    }
}

impl SystemPromptLoader for StaticSystemPromptLoader {
    fn load(&self) -> String {
        self.0.clone()
    }
}
