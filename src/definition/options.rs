//! Typed kind-specific option structs and the raw-map conversion boundary.
//!
//! The on-disk Definition schema carries kind options as a free-form map;
//! this module is the single place that map is interpreted, so every other
//! module works with a closed, typed `KindOptions` enum instead of
//! `opts.get("entrypoint").and_then(Value::as_str)` scattered everywhere.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::Kind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Standard,
    Workflow,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeOptions {
    pub entrypoint: PathBuf,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub node_version: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub entrypoint_func: Option<String>,
    #[serde(default)]
    pub runtime: Option<RuntimeMode>,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub build_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PythonOptions {
    pub entrypoint: PathBuf,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub entrypoint_func: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShellOptions {
    pub entrypoint: PathBuf,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ViewOptions {
    pub entrypoint: PathBuf,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub build_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KindOptions {
    Node(NodeOptions),
    Python(PythonOptions),
    Shell(ShellOptions),
    View(ViewOptions),
    /// `image|sql|rest|builtin` kinds carry no synthesiser-relevant options.
    None,
}

impl KindOptions {
    pub fn entrypoint(&self) -> Option<&PathBuf> {
        match self {
            KindOptions::Node(o) => Some(&o.entrypoint),
            KindOptions::Python(o) => Some(&o.entrypoint),
            KindOptions::Shell(o) => Some(&o.entrypoint),
            KindOptions::View(o) => Some(&o.entrypoint),
            KindOptions::None => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeOptions> {
        match self {
            KindOptions::Node(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_python(&self) -> Option<&PythonOptions> {
        match self {
            KindOptions::Python(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_shell(&self) -> Option<&ShellOptions> {
        match self {
            KindOptions::Shell(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&ViewOptions> {
        match self {
            KindOptions::View(o) => Some(o),
            _ => None,
        }
    }
}

/// Recognised option keys per kind; anything else is rejected rather than
/// silently dropped (§3 KindOptions).
fn allowed_keys(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Node => &[
            "entrypoint",
            "workdir",
            "nodeVersion",
            "base",
            "entrypointFunc",
            "runtime",
            "buildCommand",
            "buildDir",
            "shim",
        ],
        Kind::Python => &["entrypoint", "workdir", "language", "base", "entrypointFunc"],
        Kind::Shell => &["entrypoint", "workdir"],
        Kind::View => &["entrypoint", "buildCommand", "buildDir"],
        _ => &[],
    }
}

/// Convert a raw `options` map (as deserialised from YAML/JSON) into the
/// typed struct matching `kind`, rejecting unknown keys.
pub fn parse_kind_options(kind: Kind, raw: serde_json::Value) -> anyhow::Result<KindOptions> {
    if matches!(kind, Kind::Image | Kind::Sql | Kind::Rest | Kind::Builtin) {
        return Ok(KindOptions::None);
    }

    if let serde_json::Value::Object(map) = &raw {
        let allowed = allowed_keys(kind);
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                anyhow::bail!("unknown option '{key}' for kind '{kind:?}'");
            }
        }
    }

    let opts = match kind {
        Kind::Node => KindOptions::Node(serde_json::from_value(raw)?),
        Kind::Python => KindOptions::Python(serde_json::from_value(raw)?),
        Kind::Shell => KindOptions::Shell(serde_json::from_value(raw)?),
        Kind::View => KindOptions::View(serde_json::from_value(raw)?),
        _ => unreachable!(),
    };
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_node_options() {
        let raw = json!({"entrypoint": "index.js", "nodeVersion": "18"});
        let opts = parse_kind_options(Kind::Node, raw).unwrap();
        let node = opts.as_node().unwrap();
        assert_eq!(node.entrypoint, PathBuf::from("index.js"));
        assert_eq!(node.node_version.as_deref(), Some("18"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let raw = json!({"entrypoint": "index.js", "bogusKey": true});
        assert!(parse_kind_options(Kind::Node, raw).is_err());
    }

    #[test]
    fn test_non_buildable_kind_has_no_options() {
        let opts = parse_kind_options(Kind::Sql, json!({})).unwrap();
        assert!(matches!(opts, KindOptions::None));
    }

    #[test]
    fn test_workflow_runtime_parses() {
        let raw = json!({"entrypoint": "wf.js", "runtime": "workflow"});
        let opts = parse_kind_options(Kind::Node, raw).unwrap();
        assert_eq!(opts.as_node().unwrap().runtime, Some(RuntimeMode::Workflow));
    }
}
