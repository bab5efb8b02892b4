//! Path & runtime resolver (§4.2): computes `absEntrypoint`, `taskRoot`,
//! `workDir`, `relEntrypoint` and `buildVersion` for a discovered file.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::definition::Kind;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub abs_entrypoint: PathBuf,
    pub task_root: PathBuf,
    pub work_dir: PathBuf,
    pub rel_entrypoint: String,
    pub build_version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AirplaneYaml {
    #[serde(default)]
    build_version: Option<String>,
}

fn root_marker(kind: Kind) -> Option<&'static str> {
    match kind {
        Kind::Node => Some("package.json"),
        Kind::Python => Some("requirements.txt"),
        Kind::Shell => None,
        _ => None,
    }
}

/// Find the nearest ancestor of `start_dir` containing `kind`'s root marker.
/// For Shell, the root is simply the entrypoint's own directory.
fn find_task_root(start_dir: &Path, kind: Kind) -> Result<PathBuf> {
    let Some(marker) = root_marker(kind) else {
        return Ok(start_dir.to_path_buf());
    };

    let mut dir = start_dir;
    loop {
        if dir.join(marker).exists() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => bail!("no {marker} found above {}", start_dir.display()),
        }
    }
}

/// Resolve the full path/runtime tuple for a discovered entrypoint file.
pub fn resolve(entrypoint: &Path, kind: Kind) -> Result<ResolvedPaths> {
    let abs_entrypoint = dunce_canonicalize(entrypoint)?;
    let start_dir = abs_entrypoint
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    let task_root = find_task_root(&start_dir, kind)?;
    let work_dir = task_root.clone();

    let rel_entrypoint = abs_entrypoint
        .strip_prefix(&task_root)
        .map_err(|_| anyhow::anyhow!("entrypoint escapes task root"))?
        .to_string_lossy()
        .replace('\\', "/");

    if rel_entrypoint.starts_with("..") {
        bail!("relEntrypoint '{rel_entrypoint}' escapes taskRoot");
    }

    let build_version = read_build_version(&task_root);

    Ok(ResolvedPaths {
        abs_entrypoint,
        task_root,
        work_dir,
        rel_entrypoint,
        build_version,
    })
}

fn read_build_version(task_root: &Path) -> Option<String> {
    let path = task_root.join("airplane.yaml");
    let content = std::fs::read_to_string(path).ok()?;
    let parsed: AirplaneYaml = serde_yaml::from_str(&content).ok()?;
    parsed.build_version
}

/// Case-correct, absolute path resolution without requiring the path to
/// already exist on disk for its final component (mirrors `canonicalize`
/// but tolerates a not-yet-materialised leaf, e.g. a shim we're about to
/// write).
fn dunce_canonicalize(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.canonicalize()?);
    }
    let parent = path.parent().unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", path.display()))?;
    let abs_parent = if parent.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf())
    };
    Ok(abs_parent.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_node_task_root_is_nearest_package_json() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();
        fs::write(root.join("src/nested/task.js"), "").unwrap();

        let resolved = resolve(&root.join("src/nested/task.js"), Kind::Node).unwrap();
        assert_eq!(resolved.task_root, root.canonicalize().unwrap());
        assert_eq!(resolved.rel_entrypoint, "src/nested/task.js");
    }

    #[test]
    fn test_python_task_root_requires_requirements_txt() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("requirements.txt"), "").unwrap();
        fs::write(root.join("pkg/main.py"), "").unwrap();

        let resolved = resolve(&root.join("pkg/main.py"), Kind::Python).unwrap();
        assert_eq!(resolved.task_root, root.canonicalize().unwrap());
        assert_eq!(resolved.rel_entrypoint, "pkg/main.py");
    }

    #[test]
    fn test_shell_task_root_is_own_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("scripts")).unwrap();
        fs::write(root.join("scripts/run.sh"), "").unwrap();

        let resolved = resolve(&root.join("scripts/run.sh"), Kind::Shell).unwrap();
        assert_eq!(resolved.task_root, root.join("scripts").canonicalize().unwrap());
        assert_eq!(resolved.rel_entrypoint, "run.sh");
    }

    #[test]
    fn test_build_version_from_airplane_yaml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("package.json"), "{}").unwrap();
        fs::write(root.join("airplane.yaml"), "buildVersion: \"legacy\"\n").unwrap();
        fs::write(root.join("task.js"), "").unwrap();

        let resolved = resolve(&root.join("task.js"), Kind::Node).unwrap();
        assert_eq!(resolved.build_version.as_deref(), Some("legacy"));
    }

    #[test]
    fn test_no_root_marker_is_an_error() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("task.js"), "").unwrap();
        let result = resolve(&root.join("task.js"), Kind::Node);
        assert!(result.is_err());
    }
}
