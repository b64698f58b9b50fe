// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::EngineConfig;

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/loom/config.yaml"));
    paths.push(PathBuf::from("/etc/loom/config.yml"));

    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("loom/config.yaml"));
        paths.push(cfg.join("loom/config.yml"));
    }

    paths.push(PathBuf::from(".loom/config.yaml"));
    paths.push(PathBuf::from(".loom/config.yml"));
    paths.push(PathBuf::from("loom.yaml"));
    paths.push(PathBuf::from("loom.yml"));

    paths
}

/// Load an [`EngineConfig`] by merging all discovered YAML files plus an
/// optional explicit override path. The caller must supply
/// `workspace_data_dir`/`cache_dir` somewhere in the layers (or via
/// `extra`) since those have no sane global default.
pub fn load(extra: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_layer(&mut merged, &path)?;
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_layer(&mut merged, p)?;
    }

    serde_yaml::from_value(merged).context("merged config is missing required fields (workspace_data_dir, cache_dir)")
}

fn merge_layer(dst: &mut serde_yaml::Value, path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let layer: serde_yaml::Value = serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    merge_yaml(dst, layer);
    Ok(())
}

/// Deep-merge `src` into `dst`; `src` wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_explicit_path_and_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loom.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "workspace_data_dir: /data\ncache_dir: /data/cache\nmax_iterations: 10").unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.workspace_data_dir, PathBuf::from("/data"));
        assert_eq!(cfg.continue_message, "Continue");
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        merge_yaml(
            &mut merged,
            serde_yaml::from_str("workspace_data_dir: /a\nmax_iterations: 1").unwrap(),
        );
        merge_yaml(&mut merged, serde_yaml::from_str("max_iterations: 2\ncache_dir: /a/cache").unwrap());

        let cfg: EngineConfig = serde_yaml::from_value(merged).unwrap();
        assert_eq!(cfg.workspace_data_dir, PathBuf::from("/a"));
        assert_eq!(cfg.max_iterations, 2);
    }

    #[test]
    fn missing_required_fields_errors() {
        let merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        let result: anyhow::Result<EngineConfig> = serde_yaml::from_value(merged).context("missing fields");
        assert!(result.is_err());
    }
}
