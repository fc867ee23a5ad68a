//! mr-chain - Stacked GitLab merge requests
//!
//! CLI binary for turning a linear git branch into a chain of merge requests.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

mod cli;

#[derive(Parser)]
#[command(name = "mr-chain")]
#[command(about = "Stacked GitLab merge requests from a linear git branch")]
#[command(version)]
struct Cli {
    /// Path to the git repository (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    path: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update one merge request per commit, chained together
    Sync {
        /// Git remote to push to
        #[arg(default_value = "origin")]
        remote: String,

        /// Local branch holding the stack (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,

        /// Merge the chain root to tip after syncing
        #[arg(long)]
        merge: bool,

        /// Show the plan without pushing or writing merge requests
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Root target branch for the bottom of the chain
        #[arg(long)]
        target: Option<String>,

        /// Keep source branches after merging
        #[arg(long)]
        keep_branches: bool,

        /// Close merge requests whose commit left the stack
        #[arg(long)]
        close_orphans: bool,
    },

    /// Authentication management
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Test authentication against the remote's GitLab instance
    Test {
        /// Git remote whose host to test
        #[arg(default_value = "origin")]
        remote: String,
    },
    /// Show authentication setup instructions
    Setup,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let path = cli.path.unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Sync {
            remote,
            branch,
            merge,
            dry_run,
            yes,
            target,
            keep_branches,
            close_orphans,
        } => {
            let options = cli::SyncOptions {
                branch,
                merge,
                dry_run,
                confirm: !yes && std::env::var_os("CI").is_none(),
                overrides: mr_chain::config::ConfigOverrides {
                    target_branch: target,
                    keep_branches,
                    close_orphans,
                },
            };
            let success = cli::run_sync(&path, &remote, options).await?;
            Ok(if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Auth { action } => {
            match action {
                AuthAction::Test { remote } => cli::run_auth_test(&path, &remote).await?,
                AuthAction::Setup => cli::run_auth_setup(),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
