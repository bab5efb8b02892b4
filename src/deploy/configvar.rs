//! Config-var existence check (§4.8): every env-var entry that references a
//! platform config, and every config attached to a task, must exist before
//! deploy; missing configs are created interactively or the deploy fails.

use crate::definition::{Definition, EnvVarValue};
use crate::error::{DeployError, Result};
use crate::platform::{parse_config_ref, PlatformClient, PlatformError};

pub trait ConfigVarPrompt {
    /// Ask whether to create a missing config, returning `(value, is_secret)`
    /// if the user wants to proceed, `None` to abort.
    fn prompt_create(&self, name: &str) -> Option<(String, bool)>;
}

pub struct InteractiveConfigVarPrompt {
    pub interactive: bool,
}

impl ConfigVarPrompt for InteractiveConfigVarPrompt {
    fn prompt_create(&self, name: &str) -> Option<(String, bool)> {
        if !self.interactive {
            return None;
        }
        let value: String = dialoguer::Input::new()
            .with_prompt(format!("config '{name}' does not exist — enter a value to create it"))
            .interact_text()
            .ok()?;
        let is_secret = dialoguer::Confirm::new()
            .with_prompt("is this value secret?")
            .default(true)
            .interact()
            .unwrap_or(true);
        Some((value, is_secret))
    }
}

/// Collect every referenced config name (`name[:tag]`) from the env-var map
/// and the explicit `configs` attachments.
fn referenced_configs(definition: &Definition) -> Vec<String> {
    let mut names: Vec<String> = definition
        .env
        .values()
        .filter_map(|v| match v {
            EnvVarValue::ConfigRef { config } => Some(config.clone()),
            EnvVarValue::Value { .. } => None,
        })
        .collect();
    names.extend(definition.configs.iter().cloned());
    names.sort();
    names.dedup();
    names
}

/// Ensure every config referenced by `definition` exists on the platform,
/// creating missing ones via `prompt` when interactive.
pub fn ensure_configs_exist(
    client: &dyn PlatformClient,
    definition: &Definition,
    env_slug: Option<&str>,
    prompt: &dyn ConfigVarPrompt,
) -> Result<()> {
    for raw in referenced_configs(definition) {
        let (name, tag) = parse_config_ref(&raw);
        match client.get_config(name, tag, env_slug) {
            Ok(_) => continue,
            Err(PlatformError::NotFound { .. }) => match prompt.prompt_create(name) {
                Some((value, is_secret)) => {
                    client
                        .create_config(name, &value, is_secret)
                        .map_err(|e| DeployError::Upstream(e.into()))?;
                }
                None => return Err(DeployError::Input(format!("config '{name}' does not exist and was not created"))),
            },
            Err(err) => return Err(DeployError::Upstream(err.into())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Kind, KindOptions, Permissions};
    use indexmap::IndexMap;

    fn stub_with_env(env: IndexMap<String, EnvVarValue>) -> Definition {
        Definition {
            slug: "a".into(),
            name: "a".into(),
            description: String::new(),
            kind: Kind::Node,
            options: KindOptions::None,
            parameters: Vec::new(),
            resources: Default::default(),
            constraints: Default::default(),
            schedules: Default::default(),
            env,
            configs: vec!["shared_secret".into()],
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
    fn test_referenced_configs_merges_env_refs_and_attachments() {
        let mut env = IndexMap::new();
        env.insert("API_KEY".to_string(), EnvVarValue::ConfigRef { config: "api_key:prod".into() });
        env.insert("LITERAL".to_string(), EnvVarValue::Value { value: "x".into() });
        let definition = stub_with_env(env);

        let names = referenced_configs(&definition);
        assert_eq!(names, vec!["api_key:prod".to_string(), "shared_secret".to_string()]);
    }
}
