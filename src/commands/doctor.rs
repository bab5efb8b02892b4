//! Doctor command: check that the local toolchain this crate shells out to
//! (docker, git, node, python) is actually present and reachable, rather
//! than diagnosing generated-file drift (the teacher's original purpose for
//! this command, which doesn't apply to a deploy-only CLI).

use colored::Colorize;
use std::process::Command;

#[derive(Debug, Clone, PartialEq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug)]
pub struct Issue {
    pub component: String,
    pub description: String,
    pub severity: Severity,
}

/// Check that `binary --version` runs successfully, i.e. the binary exists
/// on `PATH` and is executable.
fn check_binary(binary: &str, version_flag: &str) -> Option<Issue> {
    match Command::new(binary).arg(version_flag).output() {
        Ok(output) if output.status.success() => None,
        Ok(_) => Some(Issue {
            component: binary.to_string(),
            description: format!("`{binary} {version_flag}` exited non-zero"),
            severity: Severity::Warning,
        }),
        Err(_) => Some(Issue {
            component: binary.to_string(),
            description: "not found on PATH".to_string(),
            severity: Severity::Error,
        }),
    }
}

fn check_docker_daemon() -> Option<Issue> {
    match Command::new("docker").arg("info").output() {
        Ok(output) if output.status.success() => None,
        Ok(_) => Some(Issue {
            component: "docker daemon".to_string(),
            description: "`docker info` failed — is the daemon running?".to_string(),
            severity: Severity::Error,
        }),
        Err(_) => None, // already reported by check_binary("docker", ...)
    }
}

/// Run the doctor command, returning the collected issues so the caller
/// can decide the process exit code.
pub fn run() -> Vec<Issue> {
    println!("{}", "checking local toolchain...".bright_blue());
    println!();

    let mut issues = Vec::new();

    for (binary, flag, required) in [("docker", "--version", true), ("git", "--version", true), ("node", "--version", false), ("python3", "--version", false)] {
        if let Some(mut issue) = check_binary(binary, flag) {
            if !required {
                issue.severity = Severity::Warning;
            }
            issues.push(issue);
        } else if binary == "docker" {
            if let Some(issue) = check_docker_daemon() {
                issues.push(issue);
            }
        }
    }

    if issues.is_empty() {
        println!("{}", "✓ toolchain looks healthy".green().bold());
    } else {
        for issue in &issues {
            let tag = match issue.severity {
                Severity::Error => "✗".red().bold(),
                Severity::Warning => "!".yellow().bold(),
            };
            println!("{tag} {}: {}", issue.component, issue.description);
        }
    }

    issues
}
