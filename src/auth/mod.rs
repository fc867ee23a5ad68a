//! Authentication for GitLab
//!
//! Tokens come from the environment, git config, git credential helpers
//! or the glab CLI.

mod gitlab;

pub use gitlab::{GitLabAuthConfig, TOKEN_CONFIG_KEY, get_gitlab_auth, test_gitlab_auth};

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from environment variable
    EnvVar,
    /// Token from `mr-chain.private-token` in git config
    GitConfig,
    /// Password stored by a git credential helper for the host
    CredentialHelper,
    /// Token from the glab CLI
    Cli,
}

impl std::fmt::Display for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnvVar => write!(f, "environment variable"),
            Self::GitConfig => write!(f, "git config"),
            Self::CredentialHelper => write!(f, "git credential helper"),
            Self::Cli => write!(f, "glab CLI"),
        }
    }
}
