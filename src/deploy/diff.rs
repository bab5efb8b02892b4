//! Pre-deploy diff rendering (§4.7 step 3): a unified diff of the old vs
//! new Definition, rendered as YAML with coloured +/- lines.

use colored::Colorize;

use crate::definition::Definition;

/// Render a coloured unified-ish diff between the two YAML renderings.
/// Lines unique to `old` are prefixed `-` (red); lines unique to `new` are
/// prefixed `+` (green); shared lines are printed unprefixed.
pub fn render_diff(old: &Definition, new: &Definition) -> String {
    let old_yaml = serde_yaml::to_string(old).unwrap_or_default();
    let new_yaml = serde_yaml::to_string(new).unwrap_or_default();

    if old_yaml == new_yaml {
        return String::new();
    }

    let old_lines: Vec<&str> = old_yaml.lines().collect();
    let new_lines: Vec<&str> = new_yaml.lines().collect();

    let mut out = String::new();
    for line in &old_lines {
        if !new_lines.contains(line) {
            out.push_str(&format!("{}\n", format!("- {line}").red()));
        }
    }
    for line in &new_lines {
        if !old_lines.contains(line) {
            out.push_str(&format!("{}\n", format!("+ {line}").green()));
        }
    }
    out
}

pub fn has_changes(old: &Definition, new: &Definition) -> bool {
    serde_yaml::to_string(old).unwrap_or_default() != serde_yaml::to_string(new).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Kind, KindOptions, Permissions};

    fn stub(name: &str) -> Definition {
        Definition {
            slug: "a".into(),
            name: name.into(),
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
        }
    }

    #[test]
    fn test_identical_definitions_have_no_changes() {
        let a = stub("a");
        let b = stub("a");
        assert!(!has_changes(&a, &b));
        assert!(render_diff(&a, &b).is_empty());
    }

    #[test]
    fn test_renamed_definition_has_changes() {
        let a = stub("a");
        let b = stub("b");
        assert!(has_changes(&a, &b));
        let diff = render_diff(&a, &b);
        assert!(diff.contains('-'));
        assert!(diff.contains('+'));
    }
}
