//! `package.json` manifest model: dependencies, workspaces, scripts, and the
//! `airplane` install-hook section.
//!
//! Workspaces may be serialised as a bare glob array or as `{packages:
//! [...]}` (Testable Property 4); `Workspaces` accepts both and normalises
//! to a `Vec<String>`.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    Globs(Vec<String>),
    Object { packages: Vec<String> },
}

impl Workspaces {
    pub fn globs(&self) -> &[String] {
        match self {
            Workspaces::Globs(g) => g,
            Workspaces::Object { packages } => packages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Engines {
    pub node: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AirplaneSection {
    pub install: Option<String>,
    pub preinstall: Option<String>,
    pub postinstall: Option<String>,
    pub root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: IndexMap<String, String>,
    #[serde(default)]
    pub optional_dependencies: IndexMap<String, String>,
    #[serde(default)]
    pub workspaces: Option<Workspaces>,
    #[serde(default)]
    pub scripts: IndexMap<String, String>,
    #[serde(default)]
    pub engines: Engines,
    #[serde(default)]
    pub airplane: AirplaneSection,
    #[serde(default, rename = "packageManager")]
    pub package_manager: Option<String>,
}

impl PackageManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let manifest: PackageManifest = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(manifest)
    }

    /// Union of `dependencies` and `optionalDependencies` (not dev).
    pub fn runtime_dependencies(&self) -> Vec<&str> {
        self.dependencies
            .keys()
            .chain(self.optional_dependencies.keys())
            .map(String::as_str)
            .collect()
    }

    /// Yarn major version from the `packageManager` corepack field (e.g.
    /// `"yarn@3.6.0"` → `Some(3)`), used to pick Yarn 1 vs Berry install
    /// semantics (§4.3 step 1). `None` when the field is absent or isn't a
    /// pinned yarn version.
    pub fn yarn_major(&self) -> Option<u32> {
        let pinned = self.package_manager.as_deref()?;
        let version = pinned.strip_prefix("yarn@")?;
        version.split('.').next()?.parse().ok()
    }

    /// Whether this manifest declares any `pre|post|install` lifecycle
    /// scripts or an `airplane` install hook (§4.3 step 4).
    pub fn has_install_scripts(&self) -> bool {
        self.scripts.contains_key("preinstall")
            || self.scripts.contains_key("install")
            || self.scripts.contains_key("postinstall")
            || self.airplane.install.is_some()
            || self.airplane.preinstall.is_some()
            || self.airplane.postinstall.is_some()
    }
}

/// Resolved pre/post install hook shell scripts, relative to task root.
#[derive(Debug, Clone, Default)]
pub struct InstallHooks {
    pub pre_install_path: Option<String>,
    pub post_install_path: Option<String>,
}

/// Walk from `entrypoint_dir` up to `task_root` (inclusive) looking for
/// `airplane_preinstall.sh` / `airplane_postinstall.sh`, preferring the
/// closest match to the entrypoint (§4.3 step 5).
pub fn locate_install_hooks(entrypoint_dir: &Path, task_root: &Path) -> InstallHooks {
    let mut hooks = InstallHooks::default();
    let mut dir = entrypoint_dir.to_path_buf();

    loop {
        if hooks.pre_install_path.is_none() {
            let candidate = dir.join("airplane_preinstall.sh");
            if candidate.exists() {
                hooks.pre_install_path = rel_to(&candidate, task_root);
            }
        }
        if hooks.post_install_path.is_none() {
            let candidate = dir.join("airplane_postinstall.sh");
            if candidate.exists() {
                hooks.post_install_path = rel_to(&candidate, task_root);
            }
        }

        if hooks.pre_install_path.is_some() && hooks.post_install_path.is_some() {
            break;
        }
        if dir == task_root {
            break;
        }
        match dir.parent() {
            Some(parent) if parent.starts_with(task_root) || parent == task_root => {
                dir = parent.to_path_buf();
            }
            _ => break,
        }
    }

    hooks
}

fn rel_to(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

/// Enumerate workspace member `package.json` paths by walking the
/// configured globs directly (no dependency on a `yarn`/`pnpm` binary being
/// present on the build host — the Open Question decision in SPEC_FULL.md
/// §9).
pub fn enumerate_workspace_members(root: &Path, workspaces: &Workspaces) -> Vec<std::path::PathBuf> {
    let mut members = Vec::new();
    for pattern in workspaces.globs() {
        let full_pattern = root.join(pattern).join("package.json");
        let Some(pattern_str) = full_pattern.to_str() else {
            continue;
        };
        if let Ok(paths) = glob::glob(pattern_str) {
            for entry in paths.flatten() {
                members.push(entry);
            }
        }
    }
    members.sort();
    members.dedup();
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_workspaces_array_form() {
        let json = r#"{"dependencies":{},"workspaces":["a","b/*"]}"#;
        let m: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.workspaces.unwrap().globs(), &["a", "b/*"]);
    }

    #[test]
    fn test_workspaces_object_form() {
        let json = r#"{"dependencies":{},"workspaces":{"packages":["a","b/*"]}}"#;
        let m: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.workspaces.unwrap().globs(), &["a", "b/*"]);
    }

    #[test]
    fn test_has_install_scripts() {
        let json = r#"{"scripts":{"postinstall":"node setup.js"}}"#;
        let m: PackageManifest = serde_json::from_str(json).unwrap();
        assert!(m.has_install_scripts());

        let json2 = r#"{"scripts":{"build":"tsc"}}"#;
        let m2: PackageManifest = serde_json::from_str(json2).unwrap();
        assert!(!m2.has_install_scripts());
    }

    #[test]
    fn test_locate_install_hooks_walks_up() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("airplane_preinstall.sh"), "#!/bin/sh\n").unwrap();

        let hooks = locate_install_hooks(&root.join("src/nested"), root);
        assert_eq!(hooks.pre_install_path.as_deref(), Some("airplane_preinstall.sh"));
        assert!(hooks.post_install_path.is_none());
    }

    #[test]
    fn test_yarn_major_from_package_manager_field() {
        let json = r#"{"packageManager":"yarn@3.6.0"}"#;
        let m: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.yarn_major(), Some(3));

        let json2 = r#"{"packageManager":"yarn@1.22.19"}"#;
        let m2: PackageManifest = serde_json::from_str(json2).unwrap();
        assert_eq!(m2.yarn_major(), Some(1));

        let m3 = PackageManifest::default();
        assert_eq!(m3.yarn_major(), None);

        let json4 = r#"{"packageManager":"pnpm@8.0.0"}"#;
        let m4: PackageManifest = serde_json::from_str(json4).unwrap();
        assert_eq!(m4.yarn_major(), None);
    }

    #[test]
    fn test_enumerate_workspace_members() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg1")).unwrap();
        fs::create_dir_all(root.join("pkg2")).unwrap();
        fs::write(root.join("pkg1/package.json"), "{}").unwrap();
        fs::write(root.join("pkg2/package.json"), "{}").unwrap();

        let ws = Workspaces::Globs(vec!["pkg1".to_string(), "pkg2".to_string()]);
        let members = enumerate_workspace_members(root, &ws);
        assert_eq!(members.len(), 2);
    }
}
