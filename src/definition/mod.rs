//! The core data model: `Definition`, `ViewDefinition` and the discovered
//! `TaskConfig`/`ViewConfig` wrappers around them.
//!
//! Kind-specific options are explicit structs (`NodeOptions`, `PythonOptions`,
//! `ShellOptions`, `ViewOptions`) rather than an untyped `options: Map<String,
//! Value>` — the conversion boundary from raw YAML/JSON lives in
//! `options::parse_kind_options`, per design note "Untyped options map".

mod options;

pub use options::{parse_kind_options, KindOptions, NodeOptions, PythonOptions, RuntimeMode, ShellOptions, ViewOptions};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Runtime family / entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Node,
    Python,
    Shell,
    Image,
    Sql,
    Rest,
    View,
    Builtin,
}

impl Kind {
    /// Kinds that require a container image build (§4.7 step 4).
    pub fn requires_build(self) -> bool {
        matches!(self, Kind::Node | Kind::Python | Kind::Shell | Kind::View)
    }
}

/// Which discovery strategy produced a config; also the tie-break
/// precedence order (defn beats script beats code) per §4.1 step 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Script,
    Defn,
    Code,
}

impl Source {
    /// Strategies in configured precedence order, highest first.
    pub const PRECEDENCE: [Source; 3] = [Source::Defn, Source::Script, Source::Code];
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Parameter {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub cron: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub param_values: IndexMap<String, serde_json::Value>,
}

/// An env-var entry is either a literal value or a reference to a platform
/// config (`config_ref`), never both (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvVarValue {
    Value { value: String },
    ConfigRef { config: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Permissions {
    #[serde(default)]
    pub viewers: Vec<String>,
    #[serde(default)]
    pub requesters: Vec<String>,
    #[serde(default)]
    pub executers: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub require_explicit: bool,
}

/// Platform-visible build knobs, attached after discovery (§3 Lifecycles).
pub type BuildConfig = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: Kind,
    pub options: KindOptions,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub resources: IndexMap<String, String>,
    #[serde(default)]
    pub constraints: IndexMap<String, String>,
    #[serde(default)]
    pub schedules: IndexMap<String, ScheduleConfig>,
    #[serde(default)]
    pub env: IndexMap<String, EnvVarValue>,
    #[serde(default)]
    pub configs: Vec<String>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub allow_self_approvals: bool,
    #[serde(default)]
    pub concurrency_key: Option<String>,
    #[serde(default)]
    pub concurrency_limit: Option<u32>,
    #[serde(default)]
    pub restrict_callers: Vec<String>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub default_run_permissions: Option<String>,

    /// Side-channel build knobs, attached post-discovery, never part of the
    /// on-disk schema.
    #[serde(skip)]
    pub build_config: BuildConfig,
    /// Absolute entrypoint, for reverse lookups; filled in by the resolver.
    #[serde(skip)]
    pub abs_entrypoint: Option<PathBuf>,
}

impl Definition {
    pub fn is_valid_slug(slug: &str) -> bool {
        let mut chars = slug.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub entrypoint: PathBuf,
    #[serde(default)]
    pub env_vars: IndexMap<String, EnvVarValue>,
    #[serde(default = "default_base")]
    pub base: String,
}

fn default_base() -> String {
    "default".to_string()
}

#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub task_id: Option<String>,
    pub task_root: PathBuf,
    pub task_entrypoint: PathBuf,
    pub definition: Definition,
    pub source: Source,
    /// Path to the `*.task.{yaml,yml,json}` file, when `source == Defn`.
    pub definition_file_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub view_id: Option<String>,
    pub view_root: PathBuf,
    pub view_entrypoint: PathBuf,
    pub definition: ViewDefinition,
    pub source: Source,
    pub definition_file_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_validation() {
        assert!(Definition::is_valid_slug("my_task"));
        assert!(Definition::is_valid_slug("a"));
        assert!(Definition::is_valid_slug("a1b2"));
        assert!(!Definition::is_valid_slug("My_task"));
        assert!(!Definition::is_valid_slug("1task"));
        assert!(!Definition::is_valid_slug("my-task"));
        assert!(!Definition::is_valid_slug(""));
    }

    #[test]
    fn test_kind_requires_build() {
        assert!(Kind::Node.requires_build());
        assert!(Kind::View.requires_build());
        assert!(!Kind::Sql.requires_build());
        assert!(!Kind::Rest.requires_build());
        assert!(!Kind::Builtin.requires_build());
    }

    #[test]
    fn test_source_precedence_order() {
        assert_eq!(Source::PRECEDENCE[0], Source::Defn);
        assert_eq!(Source::PRECEDENCE[1], Source::Script);
        assert_eq!(Source::PRECEDENCE[2], Source::Code);
    }
}
