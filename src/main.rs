//! `airis-deploy` entrypoint: a single `deploy` verb over one or more local
//! paths (§6 "CLI surface"). Everything else — discovery, synthesis,
//! archiving, building, orchestration — lives in the library modules; this
//! file only parses flags, resolves configuration, and picks the process
//! exit code from the returned `DeployError`.

mod archive;
mod build;
mod commands;
mod config;
mod definition;
mod deploy;
mod discover;
mod dockerfile;
mod error;
mod inline;
mod log;
mod manifest;
mod platform;
mod resolver;
mod shim;
mod vcs;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};

use deploy::configvar::InteractiveConfigVarPrompt;
use discover::{Confirmer, Discoverer, InteractiveConfirmer, PromptMissingTaskHandler};
use error::DeployError;
use platform::http::HttpPlatformClient;
use platform::PlatformClient;

fn get_version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let is_release = env!("IS_RELEASE");
    let git_hash = env!("GIT_HASH");

    if is_release == "true" {
        version.to_string()
    } else {
        format!("{version}-dev (git: {git_hash})")
    }
}

#[derive(Parser)]
#[command(name = "airis-deploy")]
#[command(about = "Build-and-deploy pipeline for hosted task-execution workloads", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long = "version")]
    version: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable coloured output (also honours NO_COLOR/CI)
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover tasks/views under the given paths and deploy them
    Deploy {
        /// Input paths to scan (default: current directory)
        paths: Vec<PathBuf>,

        /// Build images locally via the container daemon instead of the
        /// remote build API
        #[arg(long)]
        local: bool,

        /// Opt into upgrading a task's legacy ("handlebars") interpolation
        /// mode during this deploy
        #[arg(long)]
        jst: bool,

        /// Newline-delimited file of changed paths; only tasks/views whose
        /// root (or definition file) contains one of these are deployed
        #[arg(long = "changed-files")]
        changed_files: Option<PathBuf>,

        /// Auto-confirm every prompt
        #[arg(long)]
        yes: bool,

        /// Auto-decline every prompt
        #[arg(long)]
        no: bool,

        /// Target environment slug
        #[arg(long)]
        env: Option<String>,
    },

    /// Check that the local toolchain (docker, git, node, python) this CLI
    /// shells out to is present and reachable
    Doctor,

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    let env_verbose = matches!(std::env::var("RUST_LOG").as_deref(), Ok("debug") | Ok("trace"));
    log::set_verbosity(cli.verbose.max(env_verbose as u8));
    if cli.no_color || std::env::var("NO_COLOR").is_ok() || std::env::var("CI").is_ok() {
        colored::control::set_override(false);
    }

    if cli.version {
        println!("airis-deploy {}", get_version());
        return;
    }

    let command = match cli.command {
        Some(c) => c,
        None => {
            let _ = Cli::command().print_help();
            println!();
            std::process::exit(1);
        }
    };

    let exit_code = match command {
        Commands::Doctor => run_doctor(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "airis-deploy", &mut std::io::stdout());
            0
        }
        Commands::Deploy {
            paths,
            local,
            jst,
            changed_files,
            yes,
            no,
            env,
        } => run_deploy(DeployArgs {
            paths,
            local,
            jst,
            changed_files,
            yes,
            no,
            env,
        }),
    };

    std::process::exit(exit_code);
}

fn run_doctor() -> i32 {
    let issues = commands::doctor::run();
    if issues.iter().any(|i| i.severity == commands::doctor::Severity::Error) {
        1
    } else {
        0
    }
}

struct DeployArgs {
    paths: Vec<PathBuf>,
    local: bool,
    jst: bool,
    changed_files: Option<PathBuf>,
    yes: bool,
    no: bool,
    env: Option<String>,
}

fn run_deploy(args: DeployArgs) -> i32 {
    if args.yes && args.no {
        log::error("--yes and --no are mutually exclusive");
        return 1;
    }

    let paths = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths
    };

    if let Err(e) = guard_against_home_directory(&paths, args.yes) {
        log::error(&e.to_string());
        return e.exit_code();
    }

    let changed_files = match args.changed_files.as_ref().map(|p| read_changed_files(p)) {
        Some(Ok(files)) => files,
        Some(Err(e)) => {
            log::error(&format!("failed to read --changed-files: {e}"));
            return 1;
        }
        None => Vec::new(),
    };

    let cfg = match config::AirplaneConfig::resolve(args.env.clone()) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error(&format!("failed to resolve configuration: {e}"));
            return 1;
        }
    };

    let client: Arc<dyn PlatformClient> = Arc::new(HttpPlatformClient::new(&cfg));

    let confirmer = InteractiveConfirmer { assume_yes: args.yes };
    let missing_task_handler = PromptMissingTaskHandler { assume_yes: args.yes };
    let config_prompt = InteractiveConfigVarPrompt {
        interactive: !args.yes && !args.no,
    };

    let discoverer = Discoverer {
        client: client.as_ref(),
        env_slug: cfg.env_slug.clone(),
        confirmer: &confirmer,
        missing_task_handler: &missing_task_handler,
    };

    let (tasks, views) = match discoverer.discover(&paths) {
        Ok(result) => result,
        Err(e) => {
            print_fatal(&e);
            return e.exit_code();
        }
    };

    if tasks.is_empty() && views.is_empty() {
        log::info("no deployable tasks or views found under the given paths");
        return 0;
    }

    let cancel = tokio_util::sync::CancellationToken::new();

    let opts = deploy::DeployOptions {
        client: Arc::clone(&client),
        env_slug: cfg.env_slug.clone(),
        assume_yes: args.yes,
        local_build: args.local,
        upgrade_interpolation: args.jst,
        changed_files,
        confirmer: &confirmer,
        config_prompt: &config_prompt,
        cancel: cancel.clone(),
    };

    let result = build_runtime().block_on(run_with_cancellation(tasks, views, opts, cancel));

    match result {
        Ok(()) => {
            log::success("deploy succeeded");
            0
        }
        Err(e) => {
            match &e {
                DeployError::Skipped => {}
                DeployError::Cancelled => log::warn("deploy cancelled"),
                _ => print_fatal(&e),
            }
            e.exit_code()
        }
    }
}

/// Watches for ctrl-c alongside the deploy future; a ctrl-c flips the shared
/// `CancellationToken`, which `poll_deployment` observes within one tick and
/// answers with exactly one `CancelDeployment` call (§4.7 step 10, §5
/// "Cancellation semantics"). The deploy future itself is never dropped —
/// only the token is flipped — so the in-flight deployment always gets its
/// cancel call rather than being silently abandoned.
async fn run_with_cancellation(
    tasks: Vec<definition::TaskConfig>,
    views: Vec<definition::ViewConfig>,
    opts: deploy::DeployOptions<'_>,
    cancel: tokio_util::sync::CancellationToken,
) -> error::Result<()> {
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn("interrupted, cancelling deployment...");
            signal_cancel.cancel();
        }
    });

    deploy::deploy(tasks, views, &opts).await
}

fn build_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("failed to start async runtime")
}

fn read_changed_files(path: &PathBuf) -> anyhow::Result<Vec<PathBuf>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Render a fatal `DeployError` for the user: `Discovery` errors get the
/// `miette`-formatted multi-line report (§7 "DiscoveryError"), everything
/// else the plain coloured one-liner.
fn print_fatal(e: &DeployError) {
    match e {
        DeployError::Discovery(reason) => {
            let report = error::DiscoveryReport {
                problems: vec![error::FieldProblem {
                    file: "discovery".to_string(),
                    reason: reason.clone(),
                }],
            };
            eprintln!("{}", report.render());
        }
        _ => log::error(&e.to_string()),
    }
}

/// §4.5 "Archiver": must refuse to archive the user's home directory
/// without interactive confirmation. Checked up front against every input
/// path, before discovery even starts walking them.
fn guard_against_home_directory(paths: &[PathBuf], assume_yes: bool) -> error::Result<()> {
    for path in paths {
        if archive::is_home_directory(path) && !assume_yes {
            let confirmer = InteractiveConfirmer { assume_yes };
            if !confirmer.confirm(&format!(
                "{} is your home directory — deploying from it will archive everything under it. Continue?",
                path.display()
            )) {
                return Err(DeployError::Input("aborting build".to_string()));
            }
        }
    }
    Ok(())
}

