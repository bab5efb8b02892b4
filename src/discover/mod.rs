//! Discoverer (§4.1): walks one or more input paths, runs every strategy
//! over every candidate file, deduplicates by slug with source-precedence
//! tie-breaking, and returns sorted `(tasks, views)` slices.
//!
//! Strategy order (`Source::PRECEDENCE`) doubles as dedup precedence: a
//! definition file beats a bare script beats an inline annotation for the
//! same slug, matching the teacher's "most explicit wins" convention
//! elsewhere in this codebase (e.g. CLI flag > env > config file).

pub mod defn;
mod inline_strategy;
mod script;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::definition::{Source, TaskConfig, ViewConfig};
use crate::error::{DeployError, Result};
use crate::platform::PlatformClient;

use defn::MissingTaskHandler;

const IGNORE_DIRS: &[&str] = &["node_modules", "__pycache__", ".git", ".airplane", ".airplane-view"];

pub trait Confirmer {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Prompts via `dialoguer`, short-circuiting to `true` when `--yes` was
/// passed (§4.1 edge cases: `.sql` rewrite, script→definition upgrade).
pub struct InteractiveConfirmer {
    pub assume_yes: bool,
}

impl Confirmer for InteractiveConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Default `MissingTaskHandler`: prompts to create a new task unless
/// `--yes`, in which case it proceeds automatically. The returned sentinel
/// (`Some(String::new())`) signals "not yet created" to the deployer, which
/// creates the task at deploy time (§4.7 step 5) rather than here.
pub struct PromptMissingTaskHandler {
    pub assume_yes: bool,
}

impl MissingTaskHandler for PromptMissingTaskHandler {
    fn on_missing_task(&self, slug: &str, file: &Path) -> Option<String> {
        if self.assume_yes {
            return Some(String::new());
        }
        let proceed = dialoguer::Confirm::new()
            .with_prompt(format!("no task named '{slug}' exists yet ({}) — create it?", file.display()))
            .default(true)
            .interact()
            .unwrap_or(false);
        if proceed {
            Some(String::new())
        } else {
            None
        }
    }
}

pub struct Discoverer<'a> {
    pub client: &'a dyn PlatformClient,
    pub env_slug: Option<String>,
    pub confirmer: &'a dyn Confirmer,
    pub missing_task_handler: &'a dyn MissingTaskHandler,
}

impl<'a> Discoverer<'a> {
    pub fn discover(&self, paths: &[PathBuf]) -> Result<(Vec<TaskConfig>, Vec<ViewConfig>)> {
        let files = enumerate_files(paths).map_err(|e| DeployError::Discovery(e.to_string()))?;

        let mut tasks_by_slug: HashMap<String, Vec<TaskConfig>> = HashMap::new();
        let mut views_by_slug: HashMap<String, Vec<ViewConfig>> = HashMap::new();

        for file in &files {
            let root = file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

            if let Some(rewritten) = self.maybe_rewrite_sql(file)? {
                self.run_definition_strategy(&rewritten, &mut tasks_by_slug, &mut views_by_slug)?;
                continue;
            }

            self.run_definition_strategy(file, &mut tasks_by_slug, &mut views_by_slug)?;

            match script::discover(file, self.client, self.env_slug.as_deref()).map_err(|e| DeployError::Discovery(e.to_string()))? {
                Some(config) => {
                    let config = self.maybe_upgrade_to_definition(config)?;
                    tasks_by_slug.entry(config.definition.slug.clone()).or_default().push(config);
                }
                None => {}
            }

            for config in inline_strategy::discover_tasks(file, &root).map_err(|e| DeployError::Discovery(e.to_string()))? {
                tasks_by_slug.entry(config.definition.slug.clone()).or_default().push(config);
            }
            for config in inline_strategy::discover_views(file, &root).map_err(|e| DeployError::Discovery(e.to_string()))? {
                views_by_slug.entry(config.definition.slug.clone()).or_default().push(config);
            }
        }

        let mut tasks: Vec<TaskConfig> = tasks_by_slug.into_iter().map(|(_, v)| dedup_by_precedence(v)).collect();
        let mut views: Vec<ViewConfig> = views_by_slug.into_iter().map(|(_, v)| dedup_view_by_precedence(v)).collect();

        tasks.sort_by(|a, b| a.definition.slug.cmp(&b.definition.slug));
        views.sort_by(|a, b| a.definition.slug.cmp(&b.definition.slug));

        let mut cleaned_roots = std::collections::HashSet::new();
        for file in &files {
            let root = file.parent().unwrap_or_else(|| Path::new("."));
            if cleaned_roots.insert(root.to_path_buf()) {
                crate::inline::clean_scratch_dirs(root);
            }
        }

        Ok((tasks, views))
    }

    fn run_definition_strategy(
        &self,
        file: &Path,
        tasks_by_slug: &mut HashMap<String, Vec<TaskConfig>>,
        views_by_slug: &mut HashMap<String, Vec<ViewConfig>>,
    ) -> Result<()> {
        if defn::is_task_definition_file(file) {
            if let Some(config) = defn::discover_task(file, self.client, self.env_slug.as_deref(), self.missing_task_handler)
                .map_err(|e| DeployError::Discovery(e.to_string()))?
            {
                tasks_by_slug.entry(config.definition.slug.clone()).or_default().push(config);
            }
        } else if defn::is_view_definition_file(file) {
            if let Some(config) = defn::discover_view(file, self.client, self.missing_task_handler)
                .map_err(|e| DeployError::Discovery(e.to_string()))?
            {
                views_by_slug.entry(config.definition.slug.clone()).or_default().push(config);
            }
        }
        Ok(())
    }

    /// `.sql` path rewrite (§4.1 edge cases): if a sibling `*.task.{yaml,yml,json}`
    /// exists and the platform knows the slug it names, confirm (always
    /// prompt, per the recorded Open Question decision) and substitute it.
    fn maybe_rewrite_sql(&self, file: &Path) -> Result<Option<PathBuf>> {
        if file.extension().and_then(|e| e.to_str()) != Some("sql") {
            return Ok(None);
        }
        let Some(sibling) = find_sibling_definition(file) else {
            return Ok(None);
        };
        if self.confirmer.confirm(&format!(
            "found {} for {} — use it instead of the bare script?",
            sibling.display(),
            file.display()
        )) {
            Ok(Some(sibling))
        } else {
            Ok(None)
        }
    }

    /// Script→definition upgrade (§4.1 edge cases): a script path whose
    /// definition also exists nearby is upgraded to the definition form,
    /// under the same confirmation rule as the `.sql` rewrite.
    fn maybe_upgrade_to_definition(&self, script_config: TaskConfig) -> Result<TaskConfig> {
        let Some(entrypoint) = script_config.definition.abs_entrypoint.clone() else {
            return Ok(script_config);
        };
        let Some(sibling) = find_sibling_definition(&entrypoint) else {
            return Ok(script_config);
        };
        if !self.confirmer.confirm(&format!(
            "found {} alongside {} — use it instead of the bare script?",
            sibling.display(),
            entrypoint.display()
        )) {
            return Ok(script_config);
        }
        match defn::discover_task(&sibling, self.client, self.env_slug.as_deref(), self.missing_task_handler)
            .map_err(|e| DeployError::Discovery(e.to_string()))?
        {
            Some(upgraded) => Ok(upgraded),
            None => Ok(script_config),
        }
    }
}

fn find_sibling_definition(file: &Path) -> Option<PathBuf> {
    let dir = file.parent()?;
    let stem = file.file_stem()?.to_str()?;
    for ext in ["yaml", "yml", "json"] {
        let candidate = dir.join(format!("{stem}.task.{ext}"));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

fn dedup_by_precedence(mut configs: Vec<TaskConfig>) -> TaskConfig {
    if configs.len() == 1 {
        return configs.remove(0);
    }
    for source in Source::PRECEDENCE {
        if let Some(idx) = configs.iter().position(|c| c.source == source) {
            return configs.remove(idx);
        }
    }
    configs.remove(0)
}

fn dedup_view_by_precedence(mut configs: Vec<ViewConfig>) -> ViewConfig {
    if configs.len() == 1 {
        return configs.remove(0);
    }
    for source in Source::PRECEDENCE {
        if let Some(idx) = configs.iter().position(|c| c.source == source) {
            return configs.remove(idx);
        }
    }
    configs.remove(0)
}

/// Recursively enumerate files under `paths`, pruning `IGNORE_DIRS`
/// directories (§4.1 step 1). A path that is itself a file is included
/// unconditionally.
fn enumerate_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }

        let walker = walkdir::WalkDir::new(path).into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            !entry
                .file_name()
                .to_str()
                .is_some_and(|name| IGNORE_DIRS.contains(&name))
        });

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_enumerate_prunes_ignored_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "").unwrap();
        fs::write(dir.path().join("task.js"), "").unwrap();

        let files = enumerate_files(&[dir.path().to_path_buf()]).unwrap();
        assert!(files.iter().any(|f| f.ends_with("task.js")));
        assert!(!files.iter().any(|f| f.to_string_lossy().contains("node_modules")));
    }

    #[test]
    fn test_sibling_definition_lookup() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("task.task.yaml"), "slug: task\n").unwrap();
        let found = find_sibling_definition(&dir.path().join("task.sql"));
        assert_eq!(found, Some(dir.path().join("task.task.yaml")));
    }

    #[test]
    fn test_dedup_prefers_defn_over_script() {
        use crate::definition::{Definition, Kind, KindOptions, Permissions};

        fn stub(source: Source) -> TaskConfig {
            TaskConfig {
                task_id: None,
                task_root: PathBuf::from("/tmp"),
                task_entrypoint: PathBuf::from("/tmp/a.js"),
                definition: Definition {
                    slug: "a".into(),
                    name: "a".into(),
                    description: String::new(),
                    kind: Kind::Node,
                    options: KindOptions::None,
                    parameters: Vec::new(),
                    resources: Default::default(),
                    constraints: Default::default(),
                    schedules: Default::default(),
                    env: Default::default(),
                    configs: Vec::new(),
                    timeout: None,
                    allow_self_approvals: false,
                    concurrency_key: None,
                    concurrency_limit: None,
                    restrict_callers: Vec::new(),
                    permissions: Permissions::default(),
                    default_run_permissions: None,
                    build_config: Default::default(),
                    abs_entrypoint: None,
                },
                source,
                definition_file_path: None,
            }
        }

        let chosen = dedup_by_precedence(vec![stub(Source::Code), stub(Source::Script), stub(Source::Defn)]);
        assert_eq!(chosen.source, Source::Defn);
    }
}
