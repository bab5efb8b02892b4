//! Script strategy (§4.1 "Script strategy"): a bare source file with no
//! definition file or inline annotation, identified purely by filename and
//! matched against an existing platform task by slug.

use std::path::Path;

use crate::definition::{parse_kind_options, Definition, Kind, Permissions, Source, TaskConfig};
use crate::platform::{PlatformClient, PlatformError};
use crate::resolver;

/// Extensions recognised as bare scripts, mapped to their runtime kind.
/// Files also matched by the definition-file or inline-code strategies
/// (`*.task.*`, `*.airplane.*`, `*_airplane.py`, `*.view.tsx`) are excluded
/// here so a single file isn't offered to two strategies at once.
fn script_kind(path: &Path) -> Option<Kind> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(".airplane.ts")
        || name.ends_with(".airplane.tsx")
        || name.ends_with(".airplane.js")
        || name.ends_with(".airplane.jsx")
        || name.ends_with("_airplane.py")
        || name.ends_with(".view.tsx")
    {
        return None;
    }

    match path.extension()?.to_str()? {
        "js" | "jsx" | "ts" | "tsx" => Some(Kind::Node),
        "py" => Some(Kind::Python),
        "sh" => Some(Kind::Shell),
        _ => None,
    }
}

/// Slug mapping: lowercase, replace non-alphanumerics with `_`, trim
/// leading/trailing `_` (§4.1 Testable Property / Script strategy).
pub fn slug_from_filename(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let mapped: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    mapped.trim_matches('_').to_string()
}

pub fn discover(file: &Path, client: &dyn PlatformClient, env_slug: Option<&str>) -> anyhow::Result<Option<TaskConfig>> {
    let Some(kind) = script_kind(file) else {
        return Ok(None);
    };

    let slug = slug_from_filename(file);
    if slug.is_empty() {
        return Ok(None);
    }

    let remote = match client.get_task(&slug, env_slug) {
        Ok(remote) => remote,
        Err(PlatformError::NotFound { .. }) => {
            crate::log::warn(&format!("no task '{slug}' on the platform for {}, skipping", file.display()));
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };

    if remote.archived {
        crate::log::warn(&format!("task '{slug}' is archived, skipping {}", file.display()));
        return Ok(None);
    }

    let resolved = resolver::resolve(file, kind)?;
    let entrypoint_value = serde_json::Value::String(resolved.rel_entrypoint.clone());
    let options = parse_kind_options(kind, serde_json::json!({ "entrypoint": entrypoint_value }))?;

    let definition = Definition {
        slug: remote.slug.clone(),
        name: remote.slug.clone(),
        description: String::new(),
        kind,
        options,
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
        abs_entrypoint: Some(resolved.abs_entrypoint.clone()),
    };

    Ok(Some(TaskConfig {
        task_id: Some(remote.id),
        task_root: resolved.task_root,
        task_entrypoint: resolved.abs_entrypoint,
        definition,
        source: Source::Script,
        definition_file_path: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_from_filename_lowercases_and_replaces() {
        assert_eq!(slug_from_filename(Path::new("My-Task 2.js")), "my_task_2");
        assert_eq!(slug_from_filename(Path::new("__leading.py")), "leading");
        assert_eq!(slug_from_filename(Path::new("simple.sh")), "simple");
    }

    #[test]
    fn test_script_kind_excludes_inline_and_definition_names() {
        assert_eq!(script_kind(Path::new("task.js")), Some(Kind::Node));
        assert_eq!(script_kind(Path::new("task.airplane.ts")), None);
        assert_eq!(script_kind(Path::new("helpers_airplane.py")), None);
        assert_eq!(script_kind(Path::new("dash.view.tsx")), None);
    }
}
