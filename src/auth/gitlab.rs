//! GitLab authentication

use crate::auth::AuthSource;
use crate::error::{Error, Result};
use crate::git::GitOps;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use tokio::process::Command;
use tracing::debug;

/// Environment variables checked for a token, in order
const TOKEN_ENV_VARS: [&str; 2] = ["GITLAB_PRIVATE_TOKEN", "GITLAB_TOKEN"];

/// Git config key holding a token
pub const TOKEN_CONFIG_KEY: &str = "mr-chain.private-token";

/// GitLab authentication configuration
#[derive(Debug, Clone)]
pub struct GitLabAuthConfig {
    /// Authentication token
    pub token: String,
    /// Where the token was obtained from
    pub source: AuthSource,
    /// GitLab base URL (e.g., "https://gitlab.com")
    pub host: String,
}

/// Get GitLab authentication
///
/// Priority:
/// 1. `GITLAB_PRIVATE_TOKEN` environment variable
/// 2. `GITLAB_TOKEN` environment variable
/// 3. `mr-chain.private-token` git config value
/// 4. git credential helpers (`git credential fill` for the host)
/// 5. glab CLI (`glab auth token`)
pub async fn get_gitlab_auth(git: &dyn GitOps, host: &str) -> Result<GitLabAuthConfig> {
    let host = host.trim_end_matches('/').to_string();

    for var in TOKEN_ENV_VARS {
        if let Some(token) = env::var(var).ok().filter(|t| !t.trim().is_empty()) {
            debug!(var, "using token from environment");
            return Ok(GitLabAuthConfig {
                token: token.trim().to_string(),
                source: AuthSource::EnvVar,
                host,
            });
        }
    }

    if let Some(token) = git.config_value(TOKEN_CONFIG_KEY).await? {
        debug!("using token from git config");
        return Ok(GitLabAuthConfig {
            token,
            source: AuthSource::GitConfig,
            host,
        });
    }

    match git.credential_password(&host).await {
        Ok(Some(token)) => {
            debug!("using token from git credential helper");
            return Ok(GitLabAuthConfig {
                token,
                source: AuthSource::CredentialHelper,
                host,
            });
        }
        Ok(None) => {}
        Err(e) => debug!(error = %e, "git credential lookup failed"),
    }

    if let Some(token) = get_glab_cli_token(hostname(&host)).await {
        debug!("using token from glab");
        return Ok(GitLabAuthConfig {
            token,
            source: AuthSource::Cli,
            host,
        });
    }

    Err(Error::Auth(format!(
        "No GitLab authentication found. Set GITLAB_PRIVATE_TOKEN, \
         run `git config {TOKEN_CONFIG_KEY} <token>`, store the token with \
         `git credential approve` or run `glab auth login`"
    )))
}

/// Hostname part of a base URL, as glab expects it
fn hostname(host: &str) -> &str {
    let rest = host.split_once("://").map_or(host, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest)
}

async fn get_glab_cli_token(host: &str) -> Option<String> {
    let output = Command::new("glab")
        .args(["auth", "token", "--hostname", host])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() { None } else { Some(token) }
}

#[derive(Deserialize)]
struct GitLabUser {
    username: String,
}

/// Test GitLab authentication, returning the username
pub async fn test_gitlab_auth(config: &GitLabAuthConfig) -> Result<String> {
    let url = format!("{}/api/v4/user", config.host);

    let user: GitLabUser = Client::new()
        .get(&url)
        .header("PRIVATE-TOKEN", &config.token)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| Error::Auth(format!("Invalid token: {e}")))?
        .json()
        .await?;

    Ok(user.username)
}
