//! Changed-files filter (§4.7 step 1, Testable Property 9): keep a task
//! only if at least one changed file falls under its `taskRoot`, or one
//! changed file is exactly its definition file.

use std::path::Path;

use crate::definition::TaskConfig;

pub fn filter_changed(tasks: Vec<TaskConfig>, changed_files: &[std::path::PathBuf]) -> Vec<TaskConfig> {
    if changed_files.is_empty() {
        return tasks;
    }

    tasks
        .into_iter()
        .filter(|task| task_is_changed(task, changed_files))
        .collect()
}

fn task_is_changed(task: &TaskConfig, changed_files: &[std::path::PathBuf]) -> bool {
    changed_files.iter().any(|changed| {
        changed.starts_with(&task.task_root)
            || task
                .definition_file_path
                .as_deref()
                .is_some_and(|defn_path: &Path| defn_path == changed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Definition, Kind, KindOptions, Permissions, Source};
    use std::path::PathBuf;

    fn stub_task(task_root: &str, definition_file_path: Option<&str>) -> TaskConfig {
        TaskConfig {
            task_id: None,
            task_root: PathBuf::from(task_root),
            task_entrypoint: PathBuf::from(format!("{task_root}/main.js")),
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
            source: Source::Script,
            definition_file_path: definition_file_path.map(PathBuf::from),
        }
    }

    #[test]
    fn test_no_changed_files_keeps_all() {
        let tasks = vec![stub_task("/repo/a", None)];
        assert_eq!(filter_changed(tasks, &[]).len(), 1);
    }

    #[test]
    fn test_keeps_task_whose_root_contains_changed_file() {
        let tasks = vec![stub_task("/repo/a", None)];
        let changed = vec![PathBuf::from("/repo/a/main.js")];
        assert_eq!(filter_changed(tasks, &changed).len(), 1);
    }

    #[test]
    fn test_drops_task_with_no_matching_changed_file() {
        let tasks = vec![stub_task("/repo/a", None)];
        let changed = vec![PathBuf::from("/repo/b/main.js")];
        assert!(filter_changed(tasks, &changed).is_empty());
    }

    #[test]
    fn test_keeps_task_whose_definition_file_matches_exactly() {
        let tasks = vec![stub_task("/repo/a", Some("/repo/a/a.task.yaml"))];
        let changed = vec![PathBuf::from("/repo/a/a.task.yaml")];
        assert_eq!(filter_changed(tasks, &changed).len(), 1);
    }
}
