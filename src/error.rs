//! Error taxonomy for the deploy pipeline.
//!
//! Each variant maps to one of the fatal/non-fatal kinds the deployer
//! distinguishes; `main` matches on `DeployError` to pick the process exit
//! code rather than treating every error alike.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{0}")]
    Input(String),

    #[error("discovery failed")]
    Discovery(String),

    #[error("{entity} '{slug}' not found, skipping")]
    NotFound { entity: &'static str, slug: String },

    #[error("{0}")]
    Upstream(#[from] anyhow::Error),

    #[error("build failed: {0}")]
    BuildFailure(String),

    #[error("deployment {id} {status}: {reason}")]
    DeploymentTerminal {
        id: String,
        status: String,
        reason: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("skipped")]
    Skipped,
}

impl DeployError {
    /// Process exit code for this error, per the CLI contract in §6: 0 on
    /// success, and a distinct code for "deploy cancelled" vs any other
    /// fatal error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Skipped => 0,
            DeployError::Cancelled => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

/// A multi-line, per-field discovery report (§7 "DiscoveryError"), rendered
/// with `miette`'s fancy formatter rather than a flat string so each
/// offending field/reason pair gets its own line.
#[derive(Debug, Error, Diagnostic)]
#[error("one or more definition files failed validation")]
#[diagnostic(help("fix the listed fields and re-run deploy"))]
pub struct DiscoveryReport {
    #[related]
    pub problems: Vec<FieldProblem>,
}

#[derive(Debug, Error, Diagnostic)]
#[error("{file}: {reason}")]
pub struct FieldProblem {
    pub file: String,
    pub reason: String,
}

impl DiscoveryReport {
    pub fn render(self) -> String {
        format!("{:?}", miette::Report::new(self))
    }
}
