//! Git capability
//!
//! The engine talks to git only through [`GitOps`], so tests can swap in an
//! in-memory implementation.

mod cli;

pub use cli::GitCli;

use crate::error::Result;
use crate::types::RawCommit;
use async_trait::async_trait;

/// How a push may overwrite the remote branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushLease {
    /// Overwrite unconditionally
    Force,
    /// Overwrite only if the remote branch still points at this commit
    Expect(String),
}

/// Git operations the engine depends on
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Name of the checked-out branch (`DetachedHead` if none)
    async fn current_branch(&self) -> Result<String>;

    /// URL of a configured remote
    async fn remote_url(&self, remote: &str) -> Result<String>;

    /// Fetch and prune a remote
    async fn fetch(&self, remote: &str) -> Result<()>;

    /// Whether a ref resolves to a commit
    async fn ref_exists(&self, refname: &str) -> Result<bool>;

    /// Common ancestor of two refs
    async fn merge_base(&self, a: &str, b: &str) -> Result<String>;

    /// Commits reachable from `tip` but not from `base`, oldest first
    async fn commits_between(&self, base: &str, tip: &str) -> Result<Vec<RawCommit>>;

    /// Push a commit to `refs/heads/<branch>` on a remote
    async fn push(&self, remote: &str, sha: &str, branch: &str, lease: PushLease) -> Result<()>;

    /// Upstream branch name configured for a local branch (`branch.<name>.merge`)
    async fn upstream_branch(&self, local_branch: &str) -> Result<Option<String>>;

    /// Single git config value
    async fn config_value(&self, key: &str) -> Result<Option<String>>;

    /// Password the configured credential helpers store for a base URL
    ///
    /// Never prompts. `None` when no helper knows the host.
    async fn credential_password(&self, url: &str) -> Result<Option<String>>;

    /// Top-level directory of the working tree
    async fn toplevel(&self) -> Result<std::path::PathBuf>;
}
