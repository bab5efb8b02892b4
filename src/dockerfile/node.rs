//! Node/TypeScript Dockerfile recipe (§4.3 "Node recipe") — the richest of
//! the four, covering workspace install-command inference, external-package
//! computation, the shim `package.json`, install-hook placement, and the
//! optional workflow-runtime two-stage build (E2E scenario 4).

use std::path::Path;

use crate::definition::NodeOptions;
use crate::definition::RuntimeMode;
use crate::manifest::{InstallHooks, PackageManifest, Workspaces};
use crate::shim;

use super::builder::DockerfileBuilder;
use super::esm::compute_external_packages;

const SDK_VERSION: &str = "^0.3";
const WORKFLOW_RUNTIME_PACKAGE: &str = "@airplane/workflow-runtime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    NpmInstall,
    NpmCi,
    Yarn1,
    YarnBerry,
}

/// Which installer to use, inferred from lockfiles present at the root
/// (§4.3 step 1).
pub fn infer_package_manager(root: &Path, yarn_major: Option<u32>) -> PackageManager {
    if root.join("yarn.lock").exists() {
        match yarn_major {
            Some(1) | None => PackageManager::Yarn1,
            Some(_) => PackageManager::YarnBerry,
        }
    } else if root.join("package-lock.json").exists() {
        PackageManager::NpmCi
    } else {
        PackageManager::NpmInstall
    }
}

pub fn install_command(pm: PackageManager) -> &'static str {
    match pm {
        PackageManager::NpmInstall => "npm install",
        PackageManager::NpmCi => "npm ci",
        PackageManager::Yarn1 => "yarn install --non-interactive --frozen-lockfile && yarn cache clean",
        PackageManager::YarnBerry => "yarn install --immutable",
    }
}

pub struct NodeBuildInput<'a> {
    pub root: &'a Path,
    pub options: &'a NodeOptions,
    pub manifest: Option<&'a PackageManifest>,
    pub workspace_members: &'a [PackageManifest],
    pub workspace_member_names: &'a [String],
    pub yarn_major: Option<u32>,
    pub install_hooks: InstallHooks,
    pub build_arg_keys: &'a [String],
    /// `(rel_entrypoint, entrypoint_func)` for each file to bundle.
    pub files_to_build: &'a [(String, String)],
}

pub fn generate(input: &NodeBuildInput) -> String {
    let mut b = DockerfileBuilder::new();
    let is_workflow = matches!(input.options.runtime, Some(RuntimeMode::Workflow));

    let pm = infer_package_manager(input.root, input.yarn_major);
    let has_workspaces = input
        .manifest
        .and_then(|m| m.workspaces.as_ref())
        .is_some();

    b.raw("# syntax=docker/dockerfile:1.7").raw("# platform=linux/amd64");

    // Workflow-runtime tasks build in two stages (E2E scenario 4): a
    // `workflow-build` stage registers the interceptors and bundles them via
    // a helper script, and the final `task-build` stage copies the result in
    // alongside the regular bundle.
    let stage_name = if is_workflow { Some("workflow-build") } else { None };
    b.from_image(node_base_image(input.options.node_version.as_deref()), stage_name);

    b.arg("BUILD_NPM_RC", None);
    b.arg("BUILD_NPM_TOKEN", None);
    for key in input.build_arg_keys {
        b.arg(key, None);
    }
    b.run("[ -n \"$BUILD_NPM_RC\" ] && printf '%s' \"$BUILD_NPM_RC\" > /root/.npmrc || true");

    let workdir = input
        .options
        .workdir
        .as_ref()
        .map(|w| format!("/airplane/{}", w.display()))
        .unwrap_or_else(|| "/airplane".to_string());

    b.workdir("/airplane");

    // Whether the install step needs the full source tree or just manifests
    // (§4.3 step 4): any workspace package.json declaring install scripts,
    // or a configured pre-install hook, forfeits layer-cache separation.
    let needs_full_code = input.install_hooks.pre_install_path.is_some()
        || input
            .workspace_members
            .iter()
            .any(PackageManifest::has_install_scripts)
        || input.manifest.is_some_and(PackageManifest::has_install_scripts);

    if needs_full_code {
        b.copy(".", "/airplane");
    } else {
        b.copy("package*.json", "/airplane/");
        b.copy("yarn.lock* pnpm-lock.yaml* package-lock.json*", "/airplane/");
        if has_workspaces {
            b.raw("# workspace member manifests copied individually to preserve cache keys");
        }
    }

    if let Some(pre) = &input.install_hooks.pre_install_path {
        b.run(format!("sh {pre}"));
    }

    b.run(install_command(pm));

    if let Some(post) = &input.install_hooks.post_install_path {
        b.run(format!("sh {post}"));
    }

    if !needs_full_code {
        b.copy(".", "/airplane");
    }

    // Shim toolchain package.json, installed in isolation under .airplane/.
    let shim_package_json = build_shim_package_json(is_workflow);
    b.write_file("/airplane/.airplane/package.json", shim_package_json, false);
    b.run("cd /airplane/.airplane && npm install --legacy-peer-deps");

    let external_packages = compute_external_packages(
        input
            .workspace_members
            .iter()
            .chain(input.manifest)
            .flat_map(|m| m.runtime_dependencies().into_iter()),
        input.workspace_member_names,
    );

    let mut external_flags: Vec<String> = external_packages
        .iter()
        .map(|p| format!("--external:{p}"))
        .collect();
    if is_workflow {
        external_flags.push("--external:@temporalio/*".to_string());
        external_flags.push("--external:@swc/*".to_string());
    }

    for (rel_entrypoint, entrypoint_func) in input.files_to_build {
        let dist_basename = sanitise_dist_name(rel_entrypoint);
        let dist_name = format!(".airplane/dist/{dist_basename}");
        b.run(format!(
            "node /airplane/.airplane/node_modules/.bin/esbuild {rel_entrypoint} --bundle --platform=node --outfile={dist_name} {flags}",
            flags = external_flags.join(" "),
        ));

        if is_workflow {
            b.run(format!(
                "node /airplane/.airplane/scripts/bundle-workflow.js {dist_name}"
            ));
        }

        // `shim.js` lives alongside the bundle in `.airplane/dist/`, so the
        // shim's own `require` must resolve `dist_basename`, not the
        // `.airplane/dist/`-prefixed path (that prefix is relative to
        // `/airplane`, not to `__dirname`).
        let shim_source = shim::node::generate(&dist_basename, entrypoint_func);
        b.write_file("/airplane/.airplane/dist/shim.js", shim_source, false);
    }

    if is_workflow {
        // Second stage: fresh base image holding only the bundled output of
        // `workflow-build`, so the interceptor-registration toolchain never
        // ships in the final image.
        b.from_image(node_base_image(input.options.node_version.as_deref()), Some("task-build"));
        b.workdir("/airplane");
        b.copy_from("workflow-build", "/airplane", "/airplane");
    }

    b.workdir(workdir);
    b.entrypoint(vec![
        "node".to_string(),
        "/airplane/.airplane/dist/shim.js".to_string(),
    ]);

    b.render()
}

fn node_base_image(version: Option<&str>) -> String {
    format!("node:{}-alpine", version.unwrap_or("22"))
}

fn sanitise_dist_name(rel_entrypoint: &str) -> String {
    rel_entrypoint.replace(['/', '\\'], "_")
}

fn build_shim_package_json(is_workflow: bool) -> String {
    let mut deps = serde_json::Map::new();
    deps.insert("airplanesdk".to_string(), serde_json::json!(SDK_VERSION));
    deps.insert("esbuild".to_string(), serde_json::json!("^0.23"));
    deps.insert("esbuild-plugin-tsc".to_string(), serde_json::json!("^0.4"));
    deps.insert("typescript".to_string(), serde_json::json!("^5.6"));
    deps.insert("jsdom".to_string(), serde_json::json!("^25.0"));
    if is_workflow {
        deps.insert(
            WORKFLOW_RUNTIME_PACKAGE.to_string(),
            serde_json::json!("^1.0"),
        );
    }
    serde_json::to_string_pretty(&serde_json::json!({
        "name": "airplane-shim",
        "private": true,
        "dependencies": deps,
    }))
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn base_input<'a>(root: &'a Path, options: &'a NodeOptions) -> NodeBuildInput<'a> {
        NodeBuildInput {
            root,
            options,
            manifest: None,
            workspace_members: &[],
            workspace_member_names: &[],
            yarn_major: None,
            install_hooks: InstallHooks::default(),
            build_arg_keys: &[],
            files_to_build: &[],
        }
    }

    #[test]
    fn test_yarn1_workspace_install_command() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("yarn.lock"), "# yarn lockfile v1\n").unwrap();

        let manifest = PackageManifest {
            workspaces: Some(Workspaces::Globs(vec!["pkg1".into(), "pkg2".into()])),
            ..Default::default()
        };
        let options = NodeOptions {
            entrypoint: "index.js".into(),
            ..Default::default()
        };
        let mut input = base_input(dir.path(), &options);
        input.manifest = Some(&manifest);
        input.yarn_major = Some(1);

        let dockerfile = generate(&input);
        assert!(dockerfile.contains("yarn install --non-interactive --frozen-lockfile && yarn cache clean"));
    }

    #[test]
    fn test_workflow_runtime_marks_temporal_and_swc_external() {
        let dir = tempdir().unwrap();
        let options = NodeOptions {
            entrypoint: "wf.js".into(),
            runtime: Some(RuntimeMode::Workflow),
            ..Default::default()
        };
        let mut input = base_input(dir.path(), &options);
        input.files_to_build = &[("wf.js".to_string(), "runWorkflow".to_string())];

        let dockerfile = generate(&input);
        assert!(dockerfile.contains("--external:@temporalio/*"));
        assert!(dockerfile.contains("--external:@swc/*"));
        assert!(dockerfile.contains("bundle-workflow.js"));
        assert!(dockerfile.contains("AS workflow-build"));
        assert!(dockerfile.contains("AS task-build"));
        assert!(dockerfile.contains("COPY --from=workflow-build"));
    }

    #[test]
    fn test_entrypoint_is_shim_js() {
        let dir = tempdir().unwrap();
        let options = NodeOptions {
            entrypoint: "index.js".into(),
            ..Default::default()
        };
        let input = base_input(dir.path(), &options);
        let dockerfile = generate(&input);
        assert!(dockerfile.contains("node /airplane/.airplane/dist/shim.js"));
    }

    #[test]
    fn test_npm_ci_when_package_lock_present() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
        let options = NodeOptions {
            entrypoint: "index.js".into(),
            ..Default::default()
        };
        let input = base_input(dir.path(), &options);
        let dockerfile = generate(&input);
        assert!(dockerfile.contains("npm ci"));
    }
}
