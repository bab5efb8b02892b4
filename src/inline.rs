//! Inline parser drivers (§4.4, design note "Inline parser out-of-process").
//!
//! Extracting `__airplane`-annotated exports out of user TS/JS/Python source
//! needs a real language evaluator, which this crate does not implement: a
//! small helper executable per source family (shipped alongside this binary,
//! named `airplane-discover-node` / `airplane-discover-python`) is invoked as
//! an external collaborator over stdin/stdout. The helper bundles the
//! candidate file (and local imports) the same way the real Node build does,
//! then emits a single line `EXTRACTED_ENTITY_CONFIGS:{...}` on stdout.
//!
//! A bundling failure on an unrelated sibling file must not abort discovery
//! of the requested file (§4.4 Failure semantics); callers of
//! `extract_configs` treat any helper failure as "no inline configs found"
//! and log a warning rather than propagating.

use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use crate::definition::{Definition, ViewDefinition};

const SENTINEL_PREFIX: &str = "EXTRACTED_ENTITY_CONFIGS:";

#[derive(Debug, Deserialize, Default)]
pub struct ExtractedConfigs {
    #[serde(default, rename = "taskConfigs")]
    pub task_configs: Vec<ExtractedTaskConfig>,
    #[serde(default, rename = "viewConfigs")]
    pub view_configs: Vec<ExtractedViewConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractedTaskConfig {
    #[serde(rename = "exportName")]
    pub export_name: String,
    pub definition: Definition,
}

#[derive(Debug, Deserialize)]
pub struct ExtractedViewConfig {
    #[serde(rename = "exportName")]
    pub export_name: String,
    pub definition: ViewDefinition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFamily {
    Node,
    Python,
}

impl SourceFamily {
    fn helper_binary(self) -> &'static str {
        match self {
            SourceFamily::Node => "airplane-discover-node",
            SourceFamily::Python => "airplane-discover-python",
        }
    }
}

/// Invoke the out-of-process parser for `file`, scratching intermediate
/// bundles under `<root>/.airplane/discover/`.
pub fn extract_configs(root: &Path, file: &Path, family: SourceFamily) -> ExtractedConfigs {
    let scratch_dir = root.join(".airplane").join("discover");
    if let Err(err) = std::fs::create_dir_all(&scratch_dir) {
        crate::log::warn(&format!("could not create discover scratch dir: {err}"));
        return ExtractedConfigs::default();
    }

    let output = Command::new(family.helper_binary())
        .arg(file)
        .arg("--scratch-dir")
        .arg(&scratch_dir)
        .output();

    let output = match output {
        Ok(output) => output,
        Err(err) => {
            crate::log::warn(&format!("inline discovery helper unavailable for {}: {err}", file.display()));
            return ExtractedConfigs::default();
        }
    };

    if !output.status.success() {
        crate::log::warn(&format!(
            "inline discovery failed for {}: {}",
            file.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
        return ExtractedConfigs::default();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(line) = stdout.lines().find(|l| l.starts_with(SENTINEL_PREFIX)) else {
        crate::log::warn(&format!("no entity configs extracted from {}", file.display()));
        return ExtractedConfigs::default();
    };

    let payload = &line[SENTINEL_PREFIX.len()..];
    match serde_json::from_str(payload) {
        Ok(configs) => configs,
        Err(err) => {
            crate::log::warn(&format!("malformed extraction payload from {}: {err}", file.display()));
            ExtractedConfigs::default()
        }
    }
}

/// Best-effort cleanup of the `.airplane`/`.airplane-build-tools` scratch
/// directories under `root` (§6 "Persisted state").
pub fn clean_scratch_dirs(root: &Path) {
    for name in [".airplane", ".airplane-build-tools"] {
        let _ = std::fs::remove_dir_all(root.join(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_prefix_parses() {
        let payload = r#"{"taskConfigs":[],"viewConfigs":[]}"#;
        let line = format!("{SENTINEL_PREFIX}{payload}");
        assert!(line.starts_with(SENTINEL_PREFIX));
        let parsed: ExtractedConfigs = serde_json::from_str(&line[SENTINEL_PREFIX.len()..]).unwrap();
        assert!(parsed.task_configs.is_empty());
        assert!(parsed.view_configs.is_empty());
    }

    #[test]
    fn test_missing_helper_yields_empty_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("task.airplane.ts");
        std::fs::write(&file, "export const x = 1;").unwrap();
        let configs = extract_configs(dir.path(), &file, SourceFamily::Node);
        assert!(configs.task_configs.is_empty());
    }
}
