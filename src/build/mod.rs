//! Build driver (§4.6): turns a synthesised Dockerfile plus a source tree
//! into a pushed image, either locally (shelling to `docker buildx`,
//! mirroring the teacher's `docker_build::run_buildkit`) or remotely (via
//! the platform's `CreateBuild`/`GetBuild`/`GetBuildLogs` API).

pub mod local;
pub mod remote;

pub use local::LocalBuildDriver;
pub use remote::RemoteBuildDriver;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;
use crate::vcs::GitMetadata;

/// Registry-safe identifier: lowercase; if the last character is a digit,
/// replace it with `a` (§4.6 "ID sanitisation", Testable Property 7).
pub fn sanitise_id(id: &str) -> String {
    let mut lowered: Vec<char> = id.to_lowercase().chars().collect();
    if let Some(last) = lowered.last_mut() {
        if last.is_ascii_digit() {
            *last = 'a';
        }
    }
    lowered.into_iter().collect()
}

#[derive(Debug, Clone)]
pub struct BuildInput {
    pub entity_id: String,
    pub slug: String,
    pub kind: String,
    pub version: String,
    pub context_dir: PathBuf,
    pub dockerfile: String,
    pub build_config: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub git_metadata: Option<GitMetadata>,
    pub upload_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub image_url: String,
}

/// Abstraction over "how does a Dockerfile become a pushed image" so the
/// deployer depends on a contract rather than a concrete strategy (§4.6).
pub trait BuildDriver {
    fn build(&self, input: &BuildInput) -> Result<BuildOutput>;
}

/// `task-{sanitised-id}:{version}` for task builds (§4.6).
pub fn task_image_tag(entity_id: &str, version: &str) -> String {
    format!("task-{}:{}", sanitise_id(entity_id), version)
}

/// `bundle-build-{sanitised-id}:{version}` for bundle builds (§4.6).
pub fn bundle_image_tag(entity_id: &str, version: &str) -> String {
    format!("bundle-build-{}:{}", sanitise_id(entity_id), version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitise_id_lowercases() {
        assert_eq!(sanitise_id("MyTask"), "mytask");
    }

    #[test]
    fn test_sanitise_id_replaces_trailing_digit() {
        assert_eq!(sanitise_id("task123"), "task12a");
        assert_eq!(sanitise_id("9"), "a");
    }

    #[test]
    fn test_sanitise_id_leaves_trailing_letter() {
        assert_eq!(sanitise_id("task_abc"), "task_abc");
    }

    #[test]
    fn test_image_tags() {
        assert_eq!(task_image_tag("tsk1", "v1"), "task-tska:v1");
        assert_eq!(bundle_image_tag("tsk1", "v1"), "bundle-build-tska:v1");
    }
}
