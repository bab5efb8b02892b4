//! Process-wide configuration: platform API host/key and default env slug.
//!
//! Resolution order is flag > env var > config file > built-in default,
//! the same precedence the teacher's channel/toolchain resolution follows.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_API_HOST: &str = "https://api.airplane.dev";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    pub api_host: Option<String>,
    pub api_key: Option<String>,
    pub env_slug: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AirplaneConfig {
    pub api_host: String,
    pub api_key: Option<String>,
    pub env_slug: Option<String>,
}

impl AirplaneConfig {
    /// Resolve configuration for one invocation.
    ///
    /// `env_flag` is the `--env` CLI value, if any; it always wins over the
    /// environment variable and config-file values.
    pub fn resolve(env_flag: Option<String>) -> Result<Self> {
        let file = Self::load_file().unwrap_or_default();

        let api_host = std::env::var("AIRPLANE_API_HOST")
            .ok()
            .or(file.api_host)
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        let api_key = std::env::var("AIRPLANE_API_KEY").ok().or(file.api_key);

        let env_slug = env_flag.or_else(|| std::env::var("AIRPLANE_ENV_SLUG").ok()).or(file.env_slug);

        Ok(Self {
            api_host,
            api_key,
            env_slug,
        })
    }

    fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".airplane").join("config.yaml"))
    }

    fn load_file() -> Result<ConfigFile> {
        let Some(path) = Self::config_path() else {
            return Ok(ConfigFile::default());
        };
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let parsed: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_host() {
        // SAFETY: test runs single-threaded per-process env mutation is fine here.
        unsafe {
            std::env::remove_var("AIRPLANE_API_HOST");
            std::env::remove_var("AIRPLANE_API_KEY");
        }
        let cfg = AirplaneConfig::resolve(None).unwrap();
        assert_eq!(cfg.api_host, DEFAULT_API_HOST);
    }

    #[test]
    fn test_env_flag_wins() {
        let cfg = AirplaneConfig::resolve(Some("staging".to_string())).unwrap();
        assert_eq!(cfg.env_slug.as_deref(), Some("staging"));
    }
}
