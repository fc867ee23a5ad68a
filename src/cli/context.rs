//! Shared command context for CLI commands

use mr_chain::config::{ChainConfig, ConfigOverrides, load_remote_settings, resolve_config};
use mr_chain::error::Result;
use mr_chain::git::{GitCli, GitOps};
use mr_chain::platform::{ReviewService, create_review_service, parse_remote_url};
use mr_chain::types::ProjectConfig;
use std::path::Path;
use tracing::debug;

/// Shared context for commands that talk to GitLab
///
/// Opens the repository, resolves the layered configuration and builds the
/// review service for the remote's project.
pub struct CommandContext {
    /// Git access for the working tree
    pub git: GitCli,
    /// Resolved configuration
    pub config: ChainConfig,
    /// Review service for the remote's project
    pub service: Box<dyn ReviewService>,
}

impl CommandContext {
    /// Create a new command context
    pub async fn new(
        path: &Path,
        remote: &str,
        branch: Option<&str>,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let repo_root = GitCli::new(path).toplevel().await?;
        let git = GitCli::new(&repo_root);

        let local_branch = match branch {
            Some(b) => b.to_string(),
            None => git.current_branch().await?,
        };

        let settings = load_remote_settings(&repo_root, remote)?;
        let upstream = git.upstream_branch(&local_branch).await?;
        let config = resolve_config(
            remote,
            &local_branch,
            &settings,
            upstream.as_deref(),
            overrides,
        );
        debug!(?config, "resolved config");

        let project = resolve_project(&git, remote, settings.host.as_deref()).await?;
        let service = create_review_service(&git, &project, &config.trailer_key).await?;

        Ok(Self {
            git,
            config,
            service,
        })
    }
}

/// Project coordinates from a remote's URL
pub async fn resolve_project(
    git: &dyn GitOps,
    remote: &str,
    host_override: Option<&str>,
) -> Result<ProjectConfig> {
    let url = git.remote_url(remote).await?;
    let project = parse_remote_url(&url, host_override)?;
    debug!(host = %project.host, project = %project.project_path, "detected project");
    Ok(project)
}
