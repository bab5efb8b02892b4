//! Definition-file strategy (§4.1 "Definition-file strategy"): parses
//! `*.task.{yaml,yml,json}` and `*.view.{yaml,yml,json}` files directly.

use std::path::Path;

use crate::definition::{Definition, Source, TaskConfig, ViewConfig, ViewDefinition};
use crate::platform::{PlatformClient, PlatformError};
use crate::resolver;

/// Callback invoked when a definition file's task is missing on the
/// platform; returns the task ID to proceed with, or `None` to skip
/// (§4.1 `MissingTaskHandler`).
pub trait MissingTaskHandler {
    fn on_missing_task(&self, slug: &str, file: &Path) -> Option<String>;
}

pub fn is_task_definition_file(path: &Path) -> bool {
    matches_suffix(path, "task", &["yaml", "yml", "json"])
}

pub fn is_view_definition_file(path: &Path) -> bool {
    matches_suffix(path, "view", &["yaml", "yml", "json"])
}

fn matches_suffix(path: &Path, tag: &str, exts: &[&str]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    exts.iter().any(|ext| name.ends_with(&format!(".{tag}.{ext}")))
}

fn parse_definition(path: &Path, content: &str) -> anyhow::Result<Definition> {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        Ok(serde_json::from_str(content)?)
    } else {
        Ok(serde_yaml::from_str(content)?)
    }
}

fn parse_view_definition(path: &Path, content: &str) -> anyhow::Result<ViewDefinition> {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        Ok(serde_json::from_str(content)?)
    } else {
        Ok(serde_yaml::from_str(content)?)
    }
}

pub fn discover_task(
    file: &Path,
    client: &dyn PlatformClient,
    env_slug: Option<&str>,
    handler: &dyn MissingTaskHandler,
) -> anyhow::Result<Option<TaskConfig>> {
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(err) => {
            crate::log::warn(&format!("could not read {}: {err}", file.display()));
            return Ok(None);
        }
    };

    let mut definition = match parse_definition(file, &content) {
        Ok(definition) => definition,
        Err(err) => {
            crate::log::warn(&format!("malformed task definition {}: {err}", file.display()));
            return Ok(None);
        }
    };

    let Some(entrypoint) = definition.options.entrypoint().cloned() else {
        crate::log::warn(&format!("task definition {} has no entrypoint, skipping", file.display()));
        return Ok(None);
    };

    let entrypoint_abs = file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&entrypoint);

    let resolved = resolver::resolve(&entrypoint_abs, definition.kind)?;
    definition.abs_entrypoint = Some(resolved.abs_entrypoint.clone());

    let task_id = match client.get_task(&definition.slug, env_slug) {
        Ok(remote) => {
            if remote.archived {
                crate::log::warn(&format!("task '{}' is archived, skipping {}", definition.slug, file.display()));
                return Ok(None);
            }
            Some(remote.id)
        }
        Err(PlatformError::NotFound { .. }) => match handler.on_missing_task(&definition.slug, file) {
            Some(id) => Some(id),
            None => return Ok(None),
        },
        Err(err) => return Err(err.into()),
    };

    Ok(Some(TaskConfig {
        task_id,
        task_root: resolved.task_root,
        task_entrypoint: resolved.abs_entrypoint,
        definition,
        source: Source::Defn,
        definition_file_path: Some(file.to_path_buf()),
    }))
}

pub fn discover_view(
    file: &Path,
    client: &dyn PlatformClient,
    handler: &dyn MissingTaskHandler,
) -> anyhow::Result<Option<ViewConfig>> {
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(err) => {
            crate::log::warn(&format!("could not read {}: {err}", file.display()));
            return Ok(None);
        }
    };

    let definition = match parse_view_definition(file, &content) {
        Ok(definition) => definition,
        Err(err) => {
            crate::log::warn(&format!("malformed view definition {}: {err}", file.display()));
            return Ok(None);
        }
    };

    let view_root = file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let view_entrypoint = view_root.join(&definition.entrypoint);

    let view_id = match client.get_view(&definition.slug) {
        Ok(remote) => {
            if remote.archived {
                crate::log::warn(&format!("view '{}' is archived, skipping {}", definition.slug, file.display()));
                return Ok(None);
            }
            Some(remote.id)
        }
        Err(PlatformError::NotFound { .. }) => match handler.on_missing_task(&definition.slug, file) {
            Some(id) => Some(id),
            None => return Ok(None),
        },
        Err(err) => return Err(err.into()),
    };

    Ok(Some(ViewConfig {
        view_id,
        view_root,
        view_entrypoint,
        definition,
        source: Source::Defn,
        definition_file_path: Some(file.to_path_buf()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_file_name_matching() {
        assert!(is_task_definition_file(Path::new("foo.task.yaml")));
        assert!(is_task_definition_file(Path::new("foo.task.json")));
        assert!(!is_task_definition_file(Path::new("foo.view.yaml")));
        assert!(is_view_definition_file(Path::new("dash.view.yml")));
        assert!(!is_view_definition_file(Path::new("foo.task.yaml")));
    }
}
