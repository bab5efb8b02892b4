//! Deployer (§4.7): the orchestration core tying discovery, the Dockerfile
//! synthesiser, the archiver, the build driver and the platform API
//! together into one `deploy` invocation.

pub mod configvar;
pub mod diff;
mod fanout;
pub mod filter;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::archive;
use crate::build::{BuildDriver, BuildInput};
use crate::definition::{Kind, TaskConfig, ViewConfig};
use crate::dockerfile;
use crate::error::{DeployError, Result};
use crate::manifest::{enumerate_workspace_members, locate_install_hooks, PackageManifest};
use crate::platform::{
    CreateDeploymentRequest, DeployTaskRequest, DeployViewRequest, DeploymentStatus, InterpolationMode, PlatformClient,
};
use crate::vcs;

use configvar::ConfigVarPrompt;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct DeployOptions<'a> {
    pub client: Arc<dyn PlatformClient>,
    pub env_slug: Option<String>,
    pub assume_yes: bool,
    /// Build locally via `docker buildx` rather than the remote build API.
    pub local_build: bool,
    /// Force-upgrade a legacy ("handlebars") task to the modern
    /// interpolation mode during this deploy.
    pub upgrade_interpolation: bool,
    pub changed_files: Vec<PathBuf>,
    pub confirmer: &'a dyn crate::discover::Confirmer,
    pub config_prompt: &'a dyn ConfigVarPrompt,
    /// Cancelled by the caller (e.g. on ctrl-c) to interrupt the log-poll
    /// loop mid-deployment (§4.7 step 10, §5 "Cancellation semantics").
    pub cancel: CancellationToken,
}

/// A task paired with the pieces assembled during deploy (build output,
/// upload handle).
struct PreparedTask {
    config: TaskConfig,
    upload_id: Option<String>,
    image_url: Option<String>,
}

pub async fn deploy(tasks: Vec<TaskConfig>, views: Vec<ViewConfig>, opts: &DeployOptions<'_>) -> Result<()> {
    // Step 1-2: changed-files filter; empty result is a (non-fatal) no-op.
    let tasks = filter::filter_changed(tasks, &opts.changed_files);
    if tasks.is_empty() && views.is_empty() {
        crate::log::info("no deployable tasks or views matched the given paths");
        return Err(DeployError::Skipped);
    }

    // Step 3: pre-deploy summary + confirmation.
    render_summary(&tasks, &views, opts)?;

    // Step 3.5: tasks that build remotely need their synthesised Dockerfile
    // written into the task root before it's archived, since the remote
    // build driver builds from the uploaded tarball rather than from a
    // `BuildInput::dockerfile` string (§4.6 "Remote"). Locally-built tasks
    // synthesise inside `build_locally` instead, since the archiver never
    // runs for `--local` deploys.
    if !opts.local_build {
        for task in &tasks {
            if task.definition.kind.requires_build() {
                write_synthesised_dockerfile(task)?;
            }
        }
    }

    // Step 4: parallel archive/upload for buildable, non-local-build entities.
    let uploads = archive_all(&tasks, &views, opts).await?;

    // Step 5: sequential per-task assembly (+ local build, if requested).
    let mut deploy_tasks = Vec::with_capacity(tasks.len());
    for task in tasks {
        let upload_id = uploads.get(&task_key(&task)).cloned();
        deploy_tasks.push(prepare_task(task, upload_id, opts)?);
    }

    // Step 6: per-view assembly.
    let mut deploy_views = Vec::with_capacity(views.len());
    for view in views {
        let upload_id = uploads.get(&view_key(&view)).cloned();
        deploy_views.push((view, upload_id));
    }

    // Step 7: VCS metadata, collected once if every entity shares a repo.
    let git_metadata = collect_shared_git_metadata(&deploy_tasks, &deploy_views);

    let request = CreateDeploymentRequest {
        tasks: deploy_tasks.into_iter().map(to_deploy_task_request).collect::<Result<Vec<_>>>()?,
        views: deploy_views.into_iter().map(to_deploy_view_request).collect::<Result<Vec<_>>>()?,
        git_metadata,
        env_slug: opts.env_slug.clone(),
    };

    // Step 8: kick off the deployment.
    let deployment = opts.client.create_deployment(&request).map_err(|e| DeployError::Upstream(e.into()))?;

    // Step 9-10: poll logs/status until terminal, cancelling on request.
    poll_deployment(opts.client.as_ref(), &deployment.id, &opts.cancel).await
}

/// Render the pre-deploy listing and prompt for confirmation (§4.7 step 3).
///
/// For a defn-sourced task that already exists on the platform, this fetches
/// the stored Definition and renders a unified diff against the local one
/// (`diff::render_diff`); a task with no prior stored Definition (new, or
/// not defn-sourced) is always treated as carrying changes. Confirmation is
/// only prompted when something actually changed.
fn render_summary(tasks: &[TaskConfig], views: &[ViewConfig], opts: &DeployOptions) -> Result<()> {
    let mut any_changes = !views.is_empty();

    for task in tasks {
        crate::log::info(&format!(
            "{} {} ({})",
            "task".bold(),
            task.definition.slug,
            format!("{:?}", task.definition.kind).to_lowercase()
        ));
        if let Some(defn_path) = &task.definition_file_path {
            crate::log::info(&format!("  definition: {}", defn_path.display()));
        }

        let is_new = match task.task_id.as_deref() {
            Some(id) => id.is_empty(),
            None => true,
        };
        if is_new {
            any_changes = true;
            continue;
        }

        if task.source == crate::definition::Source::Defn {
            match opts.client.get_task_definition(&task.definition.slug, opts.env_slug.as_deref()) {
                Ok(remote) => {
                    if diff::has_changes(&remote, &task.definition) {
                        any_changes = true;
                        print!("{}", diff::render_diff(&remote, &task.definition));
                    }
                }
                Err(err) => {
                    crate::log::warn(&format!("could not fetch stored definition for '{}': {err}", task.definition.slug));
                    any_changes = true;
                }
            }
        } else {
            any_changes = true;
        }
    }
    for view in views {
        crate::log::info(&format!("{} {}", "view".bold(), view.definition.slug));
    }

    if any_changes && !opts.assume_yes && !opts.confirmer.confirm("apply these changes?") {
        return Err(DeployError::Cancelled);
    }
    Ok(())
}

fn task_key(task: &TaskConfig) -> String {
    format!("task:{}", task.definition.slug)
}

fn view_key(view: &ViewConfig) -> String {
    format!("view:{}", view.definition.slug)
}

/// Step 4: tar+upload every buildable entity that isn't being built locally
/// (local builds hand their context straight to `docker buildx`, §4.6).
async fn archive_all(tasks: &[TaskConfig], views: &[ViewConfig], opts: &DeployOptions<'_>) -> Result<HashMap<String, String>> {
    if opts.local_build {
        return Ok(HashMap::new());
    }

    let mut items = Vec::new();
    for task in tasks {
        if task.definition.kind.requires_build() {
            items.push(fanout::FanoutItem {
                key: task_key(task),
                value: task.task_root.clone(),
            });
        }
    }
    for view in views {
        items.push(fanout::FanoutItem {
            key: view_key(view),
            value: view.view_root.clone(),
        });
    }

    let progress = indicatif::ProgressBar::new(items.len() as u64);
    progress.set_style(
        indicatif::ProgressStyle::with_template("{spinner} archiving {pos}/{len} {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar()),
    );

    let client = Arc::clone(&opts.client);
    let bar = progress.clone();
    let results = fanout::run(items, move |root: PathBuf| {
        let client = Arc::clone(&client);
        let bar = bar.clone();
        async move {
            let result = tokio::task::spawn_blocking(move || archive::archive_and_upload(client.as_ref(), &root, false))
                .await
                .map_err(|e| e.to_string())?
                .map(|r| r.upload_id)
                .map_err(|e| e.to_string());
            bar.inc(1);
            result
        }
    })
    .await?;
    progress.finish_and_clear();

    Ok(results.into_iter().filter_map(|r| r.result.ok().map(|v| (r.key, v))).collect())
}

fn prepare_task(config: TaskConfig, upload_id: Option<String>, opts: &DeployOptions<'_>) -> Result<PreparedTask> {
    // Interpolation-mode check only applies to an already-existing remote
    // task (§4.7 step 5).
    if config.task_id.as_deref().is_some_and(|id| !id.is_empty()) {
        if let Ok(remote) = opts.client.get_task(&config.definition.slug, opts.env_slug.as_deref()) {
            if remote.interpolation_mode == InterpolationMode::Handlebars
                && !opts.upgrade_interpolation
                && opts.env_slug.is_some()
            {
                return Err(DeployError::Input(format!(
                    "task '{}' still uses legacy interpolation; pass --jst to upgrade before deploying with --env",
                    config.definition.slug
                )));
            }
        }
    }

    configvar::ensure_configs_exist(opts.client.as_ref(), &config.definition, opts.env_slug.as_deref(), opts.config_prompt)?;

    let image_url = if config.definition.kind.requires_build() {
        if opts.local_build {
            Some(build_locally(&config, opts)?)
        } else {
            Some(build_remotely(&config, upload_id.clone(), opts)?)
        }
    } else {
        None
    };

    Ok(PreparedTask {
        config,
        upload_id,
        image_url,
    })
}

fn build_locally(config: &TaskConfig, opts: &DeployOptions<'_>) -> Result<String> {
    let dockerfile = synthesise_dockerfile(config)?;
    let driver = crate::build::LocalBuildDriver { client: opts.client.as_ref() };
    let input = BuildInput {
        entity_id: config.definition.slug.clone(),
        slug: config.definition.slug.clone(),
        kind: format!("{:?}", config.definition.kind).to_lowercase(),
        version: "latest".to_string(),
        context_dir: config.task_root.clone(),
        dockerfile,
        build_config: config.definition.build_config.clone(),
        env: BTreeMap::new(),
        git_metadata: None,
        upload_id: None,
    };
    Ok(driver.build(&input)?.image_url)
}

/// The uploaded archive already contains the synthesised Dockerfile (written
/// by `write_synthesised_dockerfile` before `archive_all` ran), so the remote
/// driver builds from `upload_id` rather than a `BuildInput::dockerfile`
/// string (§4.6 "Remote").
fn build_remotely(config: &TaskConfig, upload_id: Option<String>, opts: &DeployOptions<'_>) -> Result<String> {
    let registry = opts
        .client
        .get_registry_token()
        .map_err(|e| DeployError::Upstream(e.into()))?
        .repository;
    let driver = crate::build::RemoteBuildDriver { client: opts.client.as_ref(), registry };
    let input = BuildInput {
        entity_id: config.definition.slug.clone(),
        slug: config.definition.slug.clone(),
        kind: format!("{:?}", config.definition.kind).to_lowercase(),
        version: "latest".to_string(),
        context_dir: config.task_root.clone(),
        dockerfile: String::new(),
        build_config: config.definition.build_config.clone(),
        env: BTreeMap::new(),
        git_metadata: None,
        upload_id,
    };
    Ok(driver.build(&input)?.image_url)
}

/// Synthesise this task's Dockerfile and write it to its root as `Dockerfile`
/// (the same name `build_locally`'s driver writes, so both paths produce an
/// identical build context), ahead of archiving.
fn write_synthesised_dockerfile(config: &TaskConfig) -> Result<()> {
    let dockerfile = synthesise_dockerfile(config)?;
    std::fs::write(config.task_root.join("Dockerfile"), dockerfile).map_err(|e| DeployError::BuildFailure(e.to_string()))?;
    Ok(())
}

fn synthesise_dockerfile(config: &TaskConfig) -> Result<String> {
    let root = &config.task_root;
    let build_arg_keys: Vec<String> = config.definition.build_config.keys().cloned().collect();
    let entrypoint_dir = config.task_entrypoint.parent().unwrap_or(root);

    let rendered = match config.definition.kind {
        Kind::Node => {
            let manifest = PackageManifest::load(&root.join("package.json")).ok();
            let node_options = config
                .definition
                .options
                .as_node()
                .ok_or_else(|| DeployError::BuildFailure("node task missing NodeOptions".into()))?;
            let install_hooks = locate_install_hooks(entrypoint_dir, root);
            let entrypoint_func = node_options.entrypoint_func.clone().unwrap_or_else(|| "default".to_string());
            let rel_entrypoint = node_options.entrypoint.to_string_lossy().to_string();

            // Real workspace-member manifests, walked from the root
            // manifest's `workspaces` globs, so external-package computation
            // and the install-scripts check see the whole monorepo rather
            // than just the root `package.json` (§4.3 steps 1 and 4).
            let workspace_members: Vec<PackageManifest> = manifest
                .as_ref()
                .and_then(|m| m.workspaces.as_ref())
                .map(|ws| enumerate_workspace_members(root, ws))
                .unwrap_or_default()
                .iter()
                .filter_map(|path| PackageManifest::load(path).ok())
                .collect();
            let workspace_member_names: Vec<String> =
                workspace_members.iter().filter_map(|m| m.name.clone()).collect();
            let yarn_major = manifest.as_ref().and_then(PackageManifest::yarn_major);

            dockerfile::node::generate(&dockerfile::node::NodeBuildInput {
                root,
                options: node_options,
                manifest: manifest.as_ref(),
                workspace_members: &workspace_members,
                workspace_member_names: &workspace_member_names,
                yarn_major,
                install_hooks,
                build_arg_keys: &build_arg_keys,
                files_to_build: &[(rel_entrypoint, entrypoint_func)],
            })
        }
        Kind::Python => {
            let python_options = config
                .definition
                .options
                .as_python()
                .ok_or_else(|| DeployError::BuildFailure("python task missing PythonOptions".into()))?;
            let install_hooks = locate_install_hooks(entrypoint_dir, root);
            dockerfile::python::generate(&dockerfile::python::PythonBuildInput {
                root,
                options: python_options,
                install_hooks,
                build_arg_keys: &build_arg_keys,
            })
            .map_err(|e| DeployError::BuildFailure(e.to_string()))?
        }
        Kind::Shell => {
            let shell_options = config
                .definition
                .options
                .as_shell()
                .ok_or_else(|| DeployError::BuildFailure("shell task missing ShellOptions".into()))?;
            let rel_entrypoint = shell_options.entrypoint.to_string_lossy().to_string();
            dockerfile::shell::generate(&dockerfile::shell::ShellBuildInput {
                root,
                options: shell_options,
                rel_entrypoint: &rel_entrypoint,
                build_arg_keys: &build_arg_keys,
            })
        }
        _ => return Err(DeployError::BuildFailure("kind does not require a build".into())),
    };
    Ok(rendered)
}

fn to_deploy_task_request(prepared: PreparedTask) -> Result<DeployTaskRequest> {
    let definition_json = serde_json::to_value(&prepared.config.definition).map_err(|e| DeployError::Upstream(e.into()))?;
    Ok(DeployTaskRequest {
        slug: prepared.config.definition.slug,
        kind: format!("{:?}", prepared.config.definition.kind).to_lowercase(),
        build_config: prepared.config.definition.build_config,
        upload_id: prepared.upload_id,
        image_url: prepared.image_url,
        definition: definition_json,
    })
}

fn to_deploy_view_request(prepared: (ViewConfig, Option<String>)) -> Result<DeployViewRequest> {
    let (config, upload_id) = prepared;
    let definition_json = serde_json::to_value(&config.definition).map_err(|e| DeployError::Upstream(e.into()))?;
    Ok(DeployViewRequest {
        slug: config.definition.slug,
        upload_id,
        definition: definition_json,
    })
}

fn collect_shared_git_metadata(tasks: &[PreparedTask], views: &[(ViewConfig, Option<String>)]) -> Option<vcs::GitMetadata> {
    let mut repos: Vec<vcs::GitRepo> = Vec::new();
    for task in tasks {
        if let Some(repo) = vcs::get_git_repo(&task.config.task_root) {
            repos.push(repo);
        }
    }
    for (view, _) in views {
        if let Some(repo) = vcs::get_git_repo(&view.view_root) {
            repos.push(repo);
        }
    }

    let first = repos.first()?.root.clone();
    if repos.iter().any(|r| r.root != first) {
        return None;
    }
    Some(vcs::get_git_metadata(&vcs::GitRepo { root: first }))
}

async fn poll_deployment(client: &dyn PlatformClient, deployment_id: &str, cancel: &CancellationToken) -> Result<()> {
    let mut page_token: Option<String> = None;
    loop {
        if cancel.is_cancelled() {
            return cancel_deployment(client, deployment_id).await;
        }

        let record = client.get_deployment(deployment_id).map_err(|e| DeployError::Upstream(e.into()))?;

        let logs = client
            .get_deployment_logs(deployment_id, page_token.as_deref())
            .map_err(|e| DeployError::Upstream(e.into()))?;
        let mut lines = logs.logs;
        lines.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        for line in &lines {
            let slug = line.text.split_whitespace().next().unwrap_or("deploy");
            crate::log::deploy_log_line(slug, &format!("{:?}", line.level).to_lowercase(), &line.text);
        }
        if logs.prev_page_token.is_some() {
            page_token = logs.prev_page_token;
        }

        if record.status.is_terminal() {
            return match record.status {
                DeploymentStatus::Succeeded => Ok(()),
                DeploymentStatus::Cancelled => Err(DeployError::Cancelled),
                _ => Err(DeployError::DeploymentTerminal {
                    id: deployment_id.to_string(),
                    status: format!("{:?}", record.status).to_lowercase(),
                    reason: record.reason.unwrap_or_default(),
                }),
            };
        }

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = cancel.cancelled() => return cancel_deployment(client, deployment_id).await,
        }
    }
}

/// Issue `CancelDeployment` on a fresh call when the caller's own context is
/// cancelled mid-poll (§4.7 step 10): `PlatformClient` calls carry no
/// cancellation state of their own, so this is "fresh" simply by not
/// depending on the cancelled `cancel` token that triggered it.
pub async fn cancel_deployment(client: &dyn PlatformClient, deployment_id: &str) -> Result<()> {
    client.cancel_deployment(deployment_id).map_err(|e| DeployError::Upstream(e.into()))?;
    Err(DeployError::Cancelled)
}
