//! `ureq`-backed implementation of `PlatformClient`, following the teacher's
//! only HTTP precedent (`commands/sync_deps.rs` queries the npm registry)
//! generalised from a one-off call to a full JSON-over-HTTP API client.

use anyhow::Context;
use serde_json::json;

use crate::config::AirplaneConfig;

use super::{
    BuildRecord, CreateBuildRequest, CreateDeploymentRequest, DeploymentRecord, LogPage,
    PlatformClient, PlatformError, RegistryToken, RemoteConfig, RemoteTask, RemoteView, Result,
    ResourceMetadata,
};

pub struct HttpPlatformClient {
    api_host: String,
    api_key: Option<String>,
}

impl HttpPlatformClient {
    pub fn new(config: &AirplaneConfig) -> Self {
        Self {
            api_host: config.api_host.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_host.trim_end_matches('/'), path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.as_deref().unwrap_or(""))
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, entity: &'static str, slug: &str) -> Result<T> {
        crate::log::debug(&format!("GET {url}"));
        let resp = ureq::get(url)
            .header("Authorization", &self.bearer())
            .call()
            .map_err(|e| Self::not_found_or_upstream(entity, slug, e))?;
        resp.into_body()
            .read_json::<T>()
            .with_context(|| format!("decoding {entity} response"))
            .map_err(PlatformError::Upstream)
    }

    fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(&self, url: &str, body: &B, what: &str) -> Result<T> {
        crate::log::debug(&format!("POST {url} ({what})"));
        let resp = ureq::post(url)
            .header("Authorization", &self.bearer())
            .send_json(body)
            .with_context(|| what.to_string())
            .map_err(PlatformError::Upstream)?;
        resp.into_body()
            .read_json::<T>()
            .with_context(|| format!("decoding {what} response"))
            .map_err(PlatformError::Upstream)
    }

    fn not_found_or_upstream(entity: &'static str, slug: &str, err: ureq::Error) -> PlatformError {
        if matches!(&err, ureq::Error::StatusCode(404)) {
            PlatformError::NotFound {
                entity,
                slug: slug.to_string(),
            }
        } else {
            PlatformError::Upstream(anyhow::anyhow!("{err}").context(format!("fetching {entity} '{slug}'")))
        }
    }
}

impl PlatformClient for HttpPlatformClient {
    fn get_task(&self, slug: &str, env_slug: Option<&str>) -> Result<RemoteTask> {
        let mut url = self.url(&format!("/v0/tasks/get?slug={slug}"));
        if let Some(env) = env_slug {
            url.push_str(&format!("&envSlug={env}"));
        }
        self.get_json(&url, "task", slug)
    }

    fn get_task_metadata(&self, slug: &str) -> Result<RemoteTask> {
        self.get_task(slug, None)
    }

    fn get_task_definition(&self, slug: &str, env_slug: Option<&str>) -> Result<crate::definition::Definition> {
        let mut url = self.url(&format!("/v0/tasks/getDefinition?slug={slug}"));
        if let Some(env) = env_slug {
            url.push_str(&format!("&envSlug={env}"));
        }
        self.get_json(&url, "task definition", slug)
    }

    fn get_view(&self, slug: &str) -> Result<RemoteView> {
        let url = self.url(&format!("/v0/views/get?slug={slug}"));
        self.get_json(&url, "view", slug)
    }

    fn get_config(&self, name: &str, tag: Option<&str>, env_slug: Option<&str>) -> Result<RemoteConfig> {
        let mut url = self.url(&format!("/v0/configs/get?name={name}"));
        if let Some(tag) = tag {
            url.push_str(&format!("&tag={tag}"));
        }
        if let Some(env) = env_slug {
            url.push_str(&format!("&envSlug={env}"));
        }
        self.get_json(&url, "config", name)
    }

    fn create_task(&self, slug: &str, kind: &str) -> Result<RemoteTask> {
        let url = self.url("/v0/tasks/create");
        self.post_json(&url, &json!({"slug": slug, "kind": kind}), "creating task")
    }

    fn create_view(&self, slug: &str) -> Result<RemoteView> {
        let url = self.url("/v0/views/create");
        self.post_json(&url, &json!({"slug": slug}), "creating view")
    }

    fn create_config(&self, name: &str, value: &str, is_secret: bool) -> Result<RemoteConfig> {
        let url = self.url("/v0/configs/create");
        self.post_json(
            &url,
            &json!({"name": name, "value": value, "isSecret": is_secret}),
            "creating config",
        )
    }

    fn get_registry_token(&self) -> Result<RegistryToken> {
        let url = self.url("/v0/registry/token");
        self.get_json(&url, "registry token", "")
    }

    fn create_build(&self, req: &CreateBuildRequest) -> Result<BuildRecord> {
        let url = self.url("/v0/builds/create");
        self.post_json(&url, req, "creating build")
    }

    fn get_build(&self, id: &str) -> Result<BuildRecord> {
        let url = self.url(&format!("/v0/builds/get?id={id}"));
        self.get_json(&url, "build", id)
    }

    fn get_build_logs(&self, id: &str, token: Option<&str>) -> Result<LogPage> {
        let mut url = self.url(&format!("/v0/builds/logs?id={id}"));
        if let Some(token) = token {
            url.push_str(&format!("&pageToken={token}"));
        }
        self.get_json(&url, "build logs", id)
    }

    fn create_deployment(&self, req: &CreateDeploymentRequest) -> Result<DeploymentRecord> {
        let url = self.url("/v0/deployments/create");
        self.post_json(&url, req, "creating deployment")
    }

    fn get_deployment(&self, id: &str) -> Result<DeploymentRecord> {
        let url = self.url(&format!("/v0/deployments/get?id={id}"));
        self.get_json(&url, "deployment", id)
    }

    fn get_deployment_logs(&self, id: &str, token: Option<&str>) -> Result<LogPage> {
        let mut url = self.url(&format!("/v0/deployments/logs?id={id}"));
        if let Some(token) = token {
            url.push_str(&format!("&pageToken={token}"));
        }
        self.get_json(&url, "deployment logs", id)
    }

    fn cancel_deployment(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/v0/deployments/cancel?id={id}"));
        ureq::post(&url)
            .header("Authorization", &self.bearer())
            .send_empty()
            .context("cancelling deployment")
            .map_err(PlatformError::Upstream)?;
        Ok(())
    }

    fn list_resource_metadata(&self) -> Result<Vec<ResourceMetadata>> {
        let url = self.url("/v0/resources/metadata");
        self.get_json(&url, "resource metadata", "")
    }

    fn start_upload(&self) -> Result<(String, String)> {
        let url = self.url("/v0/uploads/create");
        let body: serde_json::Value = self.post_json(&url, &json!({}), "starting upload")?;
        let upload_id = body["uploadID"]
            .as_str()
            .context("missing uploadID in response")
            .map_err(PlatformError::Upstream)?
            .to_string();
        let put_url = body["writeOnlyURL"]
            .as_str()
            .context("missing writeOnlyURL in response")
            .map_err(PlatformError::Upstream)?
            .to_string();
        Ok((upload_id, put_url))
    }
}
