//! The remote platform API, modelled as a trait (§6 "Platform API") so the
//! deployer and discoverer depend on a contract rather than a concrete HTTP
//! client. `http::HttpPlatformClient` is the only production implementation;
//! tests substitute an in-memory fake.

pub mod http;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{entity} '{slug}' not found")]
    NotFound { entity: &'static str, slug: String },
    #[error("upstream error: {0}")]
    Upstream(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    Handlebars,
    Jst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub slug: String,
    pub kind: String,
    pub interpolation_mode: InterpolationMode,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteView {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    pub tag: Option<String>,
    pub is_secret: bool,
}

/// Parsed `name[:tag]` form used by env-var/config references (§4.8).
pub fn parse_config_ref(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(':') {
        Some((name, tag)) => (name, Some(tag)),
        None => (raw, None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryToken {
    pub token: String,
    pub repository: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStatus::Succeeded | BuildStatus::Failed | BuildStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: String,
    pub status: BuildStatus,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBuildRequest {
    pub slug: String,
    pub kind: String,
    pub build_config: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub upload_id: String,
    pub git_metadata: Option<crate::vcs::GitMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentStatus::Succeeded | DeploymentStatus::Failed | DeploymentStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: String,
    pub status: DeploymentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployTaskRequest {
    pub slug: String,
    pub kind: String,
    pub build_config: BTreeMap<String, String>,
    pub upload_id: Option<String>,
    pub image_url: Option<String>,
    pub definition: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployViewRequest {
    pub slug: String,
    pub upload_id: Option<String>,
    pub definition: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateDeploymentRequest {
    pub tasks: Vec<DeployTaskRequest>,
    pub views: Vec<DeployViewRequest>,
    pub git_metadata: Option<crate::vcs::GitMetadata>,
    pub env_slug: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: String,
    pub level: LogLevel,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogPage {
    pub logs: Vec<LogLine>,
    pub prev_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub slug: String,
    pub kind: String,
}

/// The platform API surface consumed by discovery and deployment (§6).
/// Blocking by design (mirrors the teacher's synchronous `ureq` usage in
/// `commands/sync_deps.rs`); async callers run it inside
/// `tokio::task::spawn_blocking`.
pub trait PlatformClient: Send + Sync {
    fn get_task(&self, slug: &str, env_slug: Option<&str>) -> Result<RemoteTask>;
    fn get_task_metadata(&self, slug: &str) -> Result<RemoteTask>;
    /// Full stored Definition for a task already on the platform, used to
    /// render the pre-deploy diff (§4.7 step 3).
    fn get_task_definition(&self, slug: &str, env_slug: Option<&str>) -> Result<crate::definition::Definition>;
    fn get_view(&self, slug: &str) -> Result<RemoteView>;
    fn get_config(&self, name: &str, tag: Option<&str>, env_slug: Option<&str>) -> Result<RemoteConfig>;
    fn create_task(&self, slug: &str, kind: &str) -> Result<RemoteTask>;
    fn create_view(&self, slug: &str) -> Result<RemoteView>;
    fn create_config(&self, name: &str, value: &str, is_secret: bool) -> Result<RemoteConfig>;
    fn get_registry_token(&self) -> Result<RegistryToken>;
    fn create_build(&self, req: &CreateBuildRequest) -> Result<BuildRecord>;
    fn get_build(&self, id: &str) -> Result<BuildRecord>;
    fn get_build_logs(&self, id: &str, token: Option<&str>) -> Result<LogPage>;
    fn create_deployment(&self, req: &CreateDeploymentRequest) -> Result<DeploymentRecord>;
    fn get_deployment(&self, id: &str) -> Result<DeploymentRecord>;
    fn get_deployment_logs(&self, id: &str, token: Option<&str>) -> Result<LogPage>;
    fn cancel_deployment(&self, id: &str) -> Result<()>;
    fn list_resource_metadata(&self) -> Result<Vec<ResourceMetadata>>;
    fn start_upload(&self) -> Result<(String, String)>;
}
