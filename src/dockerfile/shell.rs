//! Shell Dockerfile recipe (§4.3 "Shell recipe").

use std::path::Path;

use crate::definition::ShellOptions;
use crate::shim;

use super::builder::DockerfileBuilder;

const UBUNTU_UTILITIES: &[&str] = &["curl", "ca-certificates", "jq", "bash"];

pub struct ShellBuildInput<'a> {
    pub root: &'a Path,
    pub options: &'a ShellOptions,
    pub rel_entrypoint: &'a str,
    pub build_arg_keys: &'a [String],
}

pub fn generate(input: &ShellBuildInput) -> String {
    let mut b = DockerfileBuilder::new();

    b.raw("# syntax=docker/dockerfile:1.7").raw("# platform=linux/amd64");

    let user_base = input
        .root
        .join("Dockerfile.airplane")
        .exists()
        .then(|| std::fs::read_to_string(input.root.join("Dockerfile.airplane")))
        .or_else(|| input.root.join("Dockerfile").exists().then(|| std::fs::read_to_string(input.root.join("Dockerfile"))))
        .and_then(Result::ok);

    match user_base {
        Some(content) => {
            b.raw(content.trim_end());
        }
        None => {
            b.from_image("ubuntu:22.04", None);
            b.run(format!(
                "apt-get update && apt-get install -y --no-install-recommends {} && rm -rf /var/lib/apt/lists/*",
                UBUNTU_UTILITIES.join(" ")
            ));
        }
    }

    b.arg("BUILD_NPM_RC", None);
    b.arg("BUILD_NPM_TOKEN", None);
    for key in input.build_arg_keys {
        b.arg(key, None);
    }

    b.workdir("/airplane");
    b.copy(".", "/airplane");

    let shim_source = shim::shell::generate(&format!("./{}", input.rel_entrypoint));
    b.write_file("/airplane/.airplane/shim.sh", shim_source, false);
    b.run(format!("chmod +x {}", input.rel_entrypoint));

    let workdir = input
        .options
        .workdir
        .as_ref()
        .map(|w| format!("/airplane/{}", w.display()))
        .unwrap_or_else(|| "/airplane".to_string());
    b.workdir(workdir);

    // The shim already bakes `rel_entrypoint` into its own `exec` line, so the
    // container's real invocation params are the entrypoint's entire argv —
    // don't also pass rel_entrypoint here, or the script sees its own path as
    // argv[1] ahead of the actual params.
    b.entrypoint(vec!["bash".to_string(), ".airplane/shim.sh".to_string()]);

    b.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_ubuntu_base() {
        let dir = tempdir().unwrap();
        let options = ShellOptions {
            entrypoint: "run.sh".into(),
            ..Default::default()
        };
        let input = ShellBuildInput {
            root: dir.path(),
            options: &options,
            rel_entrypoint: "run.sh",
            build_arg_keys: &[],
        };
        let dockerfile = generate(&input);
        assert!(dockerfile.contains("FROM ubuntu:22.04"));
        assert!(dockerfile.contains(r#"["bash", ".airplane/shim.sh"]"#));
        assert!(dockerfile.contains("chmod +x run.sh"));
    }

    #[test]
    fn test_uses_dockerfile_airplane_when_present() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile.airplane"), "FROM alpine\n").unwrap();
        let options = ShellOptions {
            entrypoint: "run.sh".into(),
            ..Default::default()
        };
        let input = ShellBuildInput {
            root: dir.path(),
            options: &options,
            rel_entrypoint: "run.sh",
            build_arg_keys: &[],
        };
        let dockerfile = generate(&input);
        assert!(dockerfile.contains("FROM alpine"));
        assert!(!dockerfile.contains("ubuntu:22.04"));
    }
}
