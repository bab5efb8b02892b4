//! Python Dockerfile recipe (§4.3 "Python recipe").

use std::path::Path;

use crate::definition::PythonOptions;
use crate::manifest::InstallHooks;
use crate::shim;

use super::builder::DockerfileBuilder;

const SDK_VERSION: &str = "airplanesdk>=0.3,<0.4";

pub struct PythonBuildInput<'a> {
    pub root: &'a Path,
    pub options: &'a PythonOptions,
    pub install_hooks: InstallHooks,
    pub build_arg_keys: &'a [String],
}

/// Resolve the set of requirements files to copy into the image: the root
/// `requirements.txt` plus every file it (transitively) references via
/// `-r other.txt`, validated not to escape `root` via `..` (§4.3 Python
/// recipe step 2).
pub fn resolve_requirements_files(root: &Path, requirements_path: &str) -> anyhow::Result<Vec<String>> {
    let mut seen = Vec::new();
    let mut stack = vec![requirements_path.to_string()];

    while let Some(rel) = stack.pop() {
        if seen.contains(&rel) {
            continue;
        }
        if rel.starts_with("..") || rel.contains("/../") {
            anyhow::bail!("requirements reference '{rel}' escapes task root");
        }
        let full = root.join(&rel);
        if !full.exists() {
            seen.push(rel);
            continue;
        }
        let content = std::fs::read_to_string(&full)?;
        for line in content.lines() {
            let line = line.trim();
            if let Some(reference) = line.strip_prefix("-r ").or_else(|| line.strip_prefix("--requirement ")) {
                let reference = reference.trim().to_string();
                if reference.starts_with("..") {
                    anyhow::bail!("requirements reference '{reference}' escapes task root");
                }
                stack.push(reference);
            }
        }
        seen.push(rel);
    }

    seen.sort();
    seen.dedup();
    Ok(seen)
}

pub fn generate(input: &PythonBuildInput) -> String {
    let mut b = DockerfileBuilder::new();

    b.raw("# syntax=docker/dockerfile:1.7").raw("# platform=linux/amd64");
    b.from_image(python_base_image(input.options.version.as_deref(), input.options.base.as_deref()), None);

    b.arg("BUILD_NPM_RC", None);
    b.arg("BUILD_NPM_TOKEN", None);
    for key in input.build_arg_keys {
        b.arg(key, None);
    }

    b.workdir("/airplane");
    b.run(format!("pip install --no-cache-dir '{SDK_VERSION}'"));

    let shim_source = shim::python::generate(
        &input.options.entrypoint.to_string_lossy(),
        input.options.entrypoint_func.as_deref().unwrap_or("main"),
    );
    b.write_file("/airplane/.airplane/shim.py", shim_source, false);

    if let Some(pre) = &input.install_hooks.pre_install_path {
        b.run(format!("sh {pre}"));
    }

    let requirements = resolve_requirements_files(input.root, "requirements.txt").unwrap_or_default();
    for req in &requirements {
        b.copy(req, format!("/airplane/{req}"));
    }
    if !requirements.is_empty() {
        b.run("pip install --no-cache-dir -r requirements.txt");
    }

    if let Some(post) = &input.install_hooks.post_install_path {
        b.run(format!("sh {post}"));
    }

    b.copy(".", "/airplane");

    let workdir = input
        .options
        .workdir
        .as_ref()
        .map(|w| format!("/airplane/{}", w.display()))
        .unwrap_or_else(|| "/airplane".to_string());
    b.workdir(workdir);

    b.entrypoint(vec!["python".to_string(), ".airplane/shim.py".to_string()]);

    b.render()
}

fn python_base_image(version: Option<&str>, base: Option<&str>) -> String {
    let version = version.unwrap_or("3.10");
    match base {
        Some("slim") => format!("python:{version}-slim"),
        _ => format!("python:{version}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn base_input<'a>(root: &'a Path, options: &'a PythonOptions) -> PythonBuildInput<'a> {
        PythonBuildInput {
            root,
            options,
            install_hooks: InstallHooks::default(),
            build_arg_keys: &[],
        }
    }

    #[test]
    fn test_default_base_image() {
        let dir = tempdir().unwrap();
        let options = PythonOptions {
            entrypoint: "main.py".into(),
            ..Default::default()
        };
        let input = base_input(dir.path(), &options);
        let dockerfile = generate(&input);
        assert!(dockerfile.contains("FROM python:3.10\n"));
        assert!(dockerfile.contains("python .airplane/shim.py"));
    }

    #[test]
    fn test_slim_base_image() {
        let dir = tempdir().unwrap();
        let options = PythonOptions {
            entrypoint: "main.py".into(),
            version: Some("3.11".to_string()),
            base: Some("slim".to_string()),
            ..Default::default()
        };
        let input = base_input(dir.path(), &options);
        let dockerfile = generate(&input);
        assert!(dockerfile.contains("FROM python:3.11-slim\n"));
    }

    #[test]
    fn test_transitive_requirements_resolved() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("requirements.txt"), "flask\n-r dev-requirements.txt\n").unwrap();
        fs::write(dir.path().join("dev-requirements.txt"), "pytest\n").unwrap();

        let files = resolve_requirements_files(dir.path(), "requirements.txt").unwrap();
        assert!(files.contains(&"requirements.txt".to_string()));
        assert!(files.contains(&"dev-requirements.txt".to_string()));
    }

    #[test]
    fn test_escaping_requirements_reference_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("requirements.txt"), "-r ../outside.txt\n").unwrap();
        let result = resolve_requirements_files(dir.path(), "requirements.txt");
        assert!(result.is_err());
    }
}
