//! Auth command - test and explain authentication

use crate::cli::context::resolve_project;
use crate::cli::style::{Stylize, check};
use anstream::println;
use mr_chain::auth::{get_gitlab_auth, test_gitlab_auth};
use mr_chain::config::load_remote_settings;
use mr_chain::error::Result;
use mr_chain::git::{GitCli, GitOps};
use std::path::Path;

/// Run the auth test command against the remote's GitLab instance
pub async fn run_auth_test(path: &Path, remote: &str) -> Result<()> {
    let git = GitCli::new(path);
    let settings = load_remote_settings(&git.toplevel().await?, remote)?;
    let project = resolve_project(&git, remote, settings.host.as_deref()).await?;

    println!("Testing GitLab authentication for {}...", project.host.accent());
    let config = get_gitlab_auth(&git, &project.host).await?;
    let username = test_gitlab_auth(&config).await?;
    println!("{} Authenticated as: {}", check(), username.emphasis());
    println!("  Token source: {}", config.source.muted());
    Ok(())
}

/// Show authentication setup instructions
pub fn run_auth_setup() {
    println!("{}", "GitLab Authentication Setup".emphasis());
    println!("===========================");
    println!();
    println!("Option 1: Environment variable");
    println!("  Set GITLAB_PRIVATE_TOKEN (or GITLAB_TOKEN) to a token with `api` scope");
    println!();
    println!("Option 2: Git config");
    println!("  git config --global mr-chain.private-token <token>");
    println!();
    println!("Option 3: Git credential helper");
    println!("  printf 'protocol=https\\nhost=gitlab.com\\nusername=oauth2\\npassword=<token>\\n' \\");
    println!("    | git credential approve");
    println!();
    println!("Option 4: GitLab CLI (glab)");
    println!("  Install: https://gitlab.com/gitlab-org/cli");
    println!("  Run: glab auth login");
    println!();
    println!("For self-hosted GitLab whose API host differs from the git host,");
    println!("set `host` under [remotes.<name>] in .mr-chain.toml");
}
