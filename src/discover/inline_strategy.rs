//! Inline-code strategy (§4.1 "Inline-code strategy"): files annotated in
//! source rather than described by a separate definition file.

use std::path::Path;

use crate::definition::{Source, TaskConfig, ViewConfig};
use crate::inline::{self, SourceFamily};
use crate::resolver;

pub fn inline_task_family(path: &Path) -> Option<SourceFamily> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(".airplane.ts") || name.ends_with(".airplane.tsx") || name.ends_with(".airplane.js") || name.ends_with(".airplane.jsx") {
        Some(SourceFamily::Node)
    } else if name.ends_with("_airplane.py") {
        Some(SourceFamily::Python)
    } else {
        None
    }
}

pub fn is_inline_view_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".view.tsx"))
}

pub fn discover_tasks(file: &Path, root: &Path) -> anyhow::Result<Vec<TaskConfig>> {
    let Some(family) = inline_task_family(file) else {
        return Ok(Vec::new());
    };

    let kind = match family {
        SourceFamily::Node => crate::definition::Kind::Node,
        SourceFamily::Python => crate::definition::Kind::Python,
    };

    let extracted = inline::extract_configs(root, file, family);
    let resolved = resolver::resolve(file, kind)?;

    let mut configs = Vec::with_capacity(extracted.task_configs.len());
    for entry in extracted.task_configs {
        let mut definition = entry.definition;
        definition.abs_entrypoint = Some(resolved.abs_entrypoint.clone());
        configs.push(TaskConfig {
            task_id: None,
            task_root: resolved.task_root.clone(),
            task_entrypoint: resolved.abs_entrypoint.clone(),
            definition,
            source: Source::Code,
            definition_file_path: None,
        });
    }
    Ok(configs)
}

pub fn discover_views(file: &Path, root: &Path) -> anyhow::Result<Vec<ViewConfig>> {
    if !is_inline_view_file(file) {
        return Ok(Vec::new());
    }

    let extracted = inline::extract_configs(root, file, SourceFamily::Node);
    let view_root = file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

    let mut configs = Vec::with_capacity(extracted.view_configs.len());
    for entry in extracted.view_configs {
        configs.push(ViewConfig {
            view_id: None,
            view_root: view_root.clone(),
            view_entrypoint: file.to_path_buf(),
            definition: entry.definition,
            source: Source::Code,
            definition_file_path: None,
        });
    }
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_task_family_matching() {
        assert_eq!(inline_task_family(Path::new("foo.airplane.ts")), Some(SourceFamily::Node));
        assert_eq!(inline_task_family(Path::new("bar_airplane.py")), Some(SourceFamily::Python));
        assert_eq!(inline_task_family(Path::new("plain.ts")), None);
    }

    #[test]
    fn test_inline_view_file_matching() {
        assert!(is_inline_view_file(Path::new("dash.view.tsx")));
        assert!(!is_inline_view_file(Path::new("dash.view.yaml")));
    }
}
