// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_max_iterations() -> u32 {
    25
}

fn default_continue_message() -> String {
    "Continue".to_string()
}

/// Tunables for a task engine, loadable from a layered YAML config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub workspace_data_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Maximum think-act iterations per task before the engine aborts it.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Wall-clock budget for a single task, in milliseconds. `0` disables
    /// the timeout.
    #[serde(default)]
    pub task_timeout_ms: u64,
    /// Cap on consecutive max-tokens continuations. `None` means unlimited.
    #[serde(default)]
    pub max_continuations: Option<u32>,
    #[serde(default = "default_continue_message")]
    pub continue_message: String,
}

impl EngineConfig {
    /// A config rooted at `workspace_data_dir`, with `cache_dir` nested
    /// under it as `<workspace_data_dir>/cache`, and every other field at
    /// its default.
    pub fn new(workspace_data_dir: impl Into<PathBuf>) -> Self {
        let workspace_data_dir = workspace_data_dir.into();
        let cache_dir = workspace_data_dir.join("cache");
        Self {
            workspace_data_dir,
            cache_dir,
            max_iterations: default_max_iterations(),
            task_timeout_ms: 0,
            max_continuations: None,
            continue_message: default_continue_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_cache_dir_under_workspace_data_dir() {
        let cfg = EngineConfig::new("/var/loom");
        assert_eq!(cfg.cache_dir, PathBuf::from("/var/loom/cache"));
        assert_eq!(cfg.max_iterations, 25);
        assert_eq!(cfg.task_timeout_ms, 0);
        assert!(cfg.max_continuations.is_none());
        assert_eq!(cfg.continue_message, "Continue");
    }

    #[test]
    fn deserializes_with_defaults_for_omitted_fields() {
        let yaml = "workspace_data_dir: /data\ncache_dir: /data/cache\n";
        let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.max_iterations, 25);
        assert_eq!(cfg.continue_message, "Continue");
    }

    #[test]
    fn deserializes_with_explicit_overrides() {
        let yaml = "workspace_data_dir: /data\ncache_dir: /data/cache\nmax_iterations: 5\nmax_continuations: 2\n";
        let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.max_iterations, 5);
        assert_eq!(cfg.max_continuations, Some(2));
    }
}
