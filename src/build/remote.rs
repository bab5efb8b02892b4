//! Remote build driver: uploads the source archive, issues `CreateBuild`,
//! then polls `GetBuildLogs`/`GetBuild` on a 1-second tick until the build
//! reaches a terminal status (§4.6).

use std::thread::sleep;
use std::time::Duration;

use crate::error::{DeployError, Result};
use crate::platform::{BuildStatus, CreateBuildRequest, PlatformClient};

use super::{task_image_tag, BuildDriver, BuildInput, BuildOutput};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct RemoteBuildDriver<'a> {
    pub client: &'a dyn PlatformClient,
    pub registry: String,
}

impl<'a> BuildDriver for RemoteBuildDriver<'a> {
    fn build(&self, input: &BuildInput) -> Result<BuildOutput> {
        let upload_id = input
            .upload_id
            .clone()
            .ok_or_else(|| DeployError::BuildFailure(format!("{} has no uploaded archive", input.slug)))?;

        let req = CreateBuildRequest {
            slug: input.slug.clone(),
            kind: input.kind.clone(),
            build_config: input.build_config.clone(),
            env: input.env.clone(),
            upload_id,
            git_metadata: input.git_metadata.clone(),
        };

        let build = self.client.create_build(&req).map_err(|e| DeployError::Upstream(e.into()))?;

        let mut page_token: Option<String> = None;
        let mut last_error_line = String::new();
        let mut status = build.status;

        loop {
            let record = self.client.get_build(&build.id).map_err(|e| DeployError::Upstream(e.into()))?;
            status = record.status;

            let logs = self
                .client
                .get_build_logs(&build.id, page_token.as_deref())
                .map_err(|e| DeployError::Upstream(e.into()))?;

            let mut lines = logs.logs;
            lines.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            for line in &lines {
                crate::log::deploy_log_line(&input.slug, &format!("{:?}", line.level).to_lowercase(), &line.text);
                last_error_line = line.text.clone();
            }
            if logs.prev_page_token.is_some() {
                page_token = logs.prev_page_token;
            }

            if status.is_terminal() {
                match status {
                    BuildStatus::Succeeded => {
                        let image_url = record
                            .image_url
                            .unwrap_or_else(|| format!("{}/{}", self.registry, task_image_tag(&input.entity_id, &build.id)));
                        return Ok(BuildOutput { image_url });
                    }
                    BuildStatus::Cancelled => return Err(DeployError::Cancelled),
                    _ => return Err(DeployError::BuildFailure(last_error_line)),
                }
            }

            sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status_classification() {
        assert!(BuildStatus::Succeeded.is_terminal());
        assert!(BuildStatus::Failed.is_terminal());
        assert!(BuildStatus::Cancelled.is_terminal());
        assert!(!BuildStatus::Pending.is_terminal());
        assert!(!BuildStatus::Running.is_terminal());
    }
}
