//! Local build driver: shells out to `docker buildx`, grounded on the
//! teacher's `docker_build::run_buildkit` (same `Command::new("docker")`
//! idiom, inherited stdio so build events stream straight to the terminal).

use anyhow::{bail, Context};
use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{DeployError, Result};
use crate::platform::{PlatformClient, RegistryToken};

use super::{task_image_tag, BuildDriver, BuildInput, BuildOutput};

pub struct LocalBuildDriver<'a> {
    pub client: &'a dyn PlatformClient,
}

impl<'a> LocalBuildDriver<'a> {
    fn registry_login(&self, token: &RegistryToken) -> anyhow::Result<()> {
        let registry_host = token
            .repository
            .split('/')
            .next()
            .unwrap_or(&token.repository);

        let mut login = Command::new("docker")
            .args(["login", "--username", "AWS", "--password-stdin", registry_host])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .context("spawning docker login")?;

        login
            .stdin
            .take()
            .expect("piped stdin")
            .write_all(token.token.as_bytes())
            .context("writing registry password to docker login")?;

        let status = login.wait().context("waiting on docker login")?;
        if !status.success() {
            bail!("docker login to {} failed", token.repository);
        }
        Ok(())
    }

    fn run_buildx(&self, input: &BuildInput, image_url: &str) -> anyhow::Result<()> {
        let dockerfile_path = input.context_dir.join("Dockerfile");
        std::fs::write(&dockerfile_path, &input.dockerfile).context("writing synthesised Dockerfile")?;

        let mut cmd = Command::new("docker");
        cmd.arg("buildx")
            .arg("build")
            .arg("--progress=plain")
            .arg("--platform=linux/amd64")
            .arg("-t")
            .arg(image_url)
            .arg("-f")
            .arg(&dockerfile_path)
            .arg("--push");

        for (key, value) in &input.build_config {
            cmd.arg("--build-arg").arg(format!("{key}={value}"));
        }

        cmd.arg(&input.context_dir);

        let status = cmd.status().context("running docker buildx build")?;
        if !status.success() {
            bail!("docker buildx build failed with {:?}", status.code());
        }
        Ok(())
    }
}

impl<'a> BuildDriver for LocalBuildDriver<'a> {
    fn build(&self, input: &BuildInput) -> Result<BuildOutput> {
        let token = self
            .client
            .get_registry_token()
            .map_err(|e| DeployError::Upstream(e.into()))?;

        self.registry_login(&token)
            .map_err(|e| DeployError::BuildFailure(e.to_string()))?;

        let tag = task_image_tag(&input.entity_id, &input.version);
        let image_url = format!("{}/{}", token.repository, tag);

        self.run_buildx(input, &image_url)
            .map_err(|e| DeployError::BuildFailure(e.to_string()))?;

        Ok(BuildOutput { image_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url_shape() {
        let repository = "123456789.dkr.ecr.us-east-1.amazonaws.com/airplane";
        let tag = task_image_tag("my-task", "v2");
        let image_url = format!("{repository}/{tag}");
        assert_eq!(image_url, "123456789.dkr.ecr.us-east-1.amazonaws.com/airplane/task-my-task:v2");
    }
}
