//! VCS metadata glue (§6 "VCS"): shells out to `git`, mirroring the teacher's
//! `commands/affected.rs::get_changed_files`, which already drives `git diff`
//! via `std::process::Command` rather than linking a git library. Absence of
//! a repository is not an error anywhere in this module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitMetadata {
    pub repository_name: String,
    pub repository_owner: String,
    pub commit: String,
    pub branch: String,
    pub is_dirty: bool,
    pub user: String,
}

#[derive(Debug, Clone)]
pub struct GitRepo {
    pub root: PathBuf,
}

fn git(root: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").arg("-C").arg(root).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

/// Find the repository containing `path`, if any.
pub fn get_git_repo(path: &Path) -> Option<GitRepo> {
    let start = if path.is_dir() { path } else { path.parent()? };
    let root = git(start, &["rev-parse", "--show-toplevel"])?;
    Some(GitRepo { root: PathBuf::from(root) })
}

/// Collect commit/branch/dirty/remote/user metadata for `repo`. Any
/// individual lookup failing falls back to an empty string rather than
/// aborting the whole call — VCS metadata is attribution, not a contract.
pub fn get_git_metadata(repo: &GitRepo) -> GitMetadata {
    let commit = git(&repo.root, &["rev-parse", "HEAD"]).unwrap_or_default();
    let branch = git(&repo.root, &["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default();
    let is_dirty = git(&repo.root, &["status", "--porcelain"])
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    let remote_url = git(&repo.root, &["remote", "get-url", "origin"]).unwrap_or_default();
    let (owner, name) = parse_owner_repo(&remote_url);
    let user = git(&repo.root, &["config", "user.name"]).unwrap_or_default();

    GitMetadata {
        repository_name: std::env::var("GIT_REPOSITORY_NAME").unwrap_or(name),
        repository_owner: std::env::var("GIT_REPOSITORY_OWNER").unwrap_or(owner),
        commit,
        branch,
        is_dirty,
        user: std::env::var("GIT_USER").unwrap_or(user),
    }
}

/// `entrypoint`'s path relative to the repository root, forward-slash
/// normalised.
pub fn get_entrypoint_relative_to_git_root(repo: &GitRepo, entrypoint: &Path) -> Option<String> {
    entrypoint
        .strip_prefix(&repo.root)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

/// Parse `owner/name` out of an `origin` remote URL, supporting both SSH
/// (`git@github.com:owner/name.git`) and HTTPS
/// (`https://github.com/owner/name.git`) forms.
fn parse_owner_repo(remote_url: &str) -> (String, String) {
    let trimmed = remote_url.trim_end_matches(".git");
    let path = trimmed
        .rsplit_once(':')
        .map(|(_, p)| p)
        .or_else(|| trimmed.rsplit_once(".com/").map(|(_, p)| p))
        .unwrap_or(trimmed);

    match path.rsplit_once('/') {
        Some((owner, name)) => (owner.rsplit('/').next().unwrap_or(owner).to_string(), name.to_string()),
        None => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_repo_ssh() {
        let (owner, name) = parse_owner_repo("git@github.com:airplanedev/cli.git");
        assert_eq!(owner, "airplanedev");
        assert_eq!(name, "cli");
    }

    #[test]
    fn test_parse_owner_repo_https() {
        let (owner, name) = parse_owner_repo("https://github.com/airplanedev/cli.git");
        assert_eq!(owner, "airplanedev");
        assert_eq!(name, "cli");
    }

    #[test]
    fn test_parse_owner_repo_empty() {
        let (owner, name) = parse_owner_repo("");
        assert_eq!(owner, "");
        assert_eq!(name, "");
    }
}
