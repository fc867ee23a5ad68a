//! Engine configuration
//!
//! [`ChainConfig`] is resolved once per invocation and passed by reference
//! to every component. Nothing reads configuration from global state.

mod file;

pub use file::{
    ConfigFile, REPO_CONFIG_FILE, RemoteSettings, load_config_file, load_remote_settings,
    repo_config_path, user_config_path,
};

use crate::stack::DEFAULT_TRAILER_KEY;
use crate::types::ChangeId;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Root target used when nothing else is configured
pub const DEFAULT_TARGET_BRANCH: &str = "main";

/// Default number of merge status re-checks
pub const DEFAULT_MERGE_POLL_ATTEMPTS: u32 = 10;

/// Default delay between merge status re-checks
pub const DEFAULT_MERGE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Handling of remote merge requests whose identifier left the local stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Report them and leave them open
    #[default]
    Leave,
    /// Close them (and delete their branch if branch deletion is on)
    Close,
}

impl fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leave => write!(f, "leave"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// Immutable configuration threaded through the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Git remote name
    pub remote: String,
    /// Local branch holding the stack
    pub local_branch: String,
    /// Branch the bottom of the chain targets
    pub root_target: String,
    /// Delete source branches of merged entries
    pub delete_source_branch: bool,
    /// Orphan handling
    pub orphan_policy: OrphanPolicy,
    /// Trailer key holding the identifier
    pub trailer_key: String,
    /// Cancel running pipelines for superseded commits
    pub cancel_stale_pipelines: bool,
    /// Re-checks of an unknown merge status before giving up
    pub merge_poll_attempts: u32,
    /// Delay between re-checks
    pub merge_poll_interval: Duration,
}

impl ChainConfig {
    /// Config with defaults for everything but the remote and branches
    pub fn new(
        remote: impl Into<String>,
        local_branch: impl Into<String>,
        root_target: impl Into<String>,
    ) -> Self {
        Self {
            remote: remote.into(),
            local_branch: local_branch.into(),
            root_target: root_target.into(),
            delete_source_branch: true,
            orphan_policy: OrphanPolicy::Leave,
            trailer_key: DEFAULT_TRAILER_KEY.to_string(),
            cancel_stale_pipelines: true,
            merge_poll_attempts: DEFAULT_MERGE_POLL_ATTEMPTS,
            merge_poll_interval: DEFAULT_MERGE_POLL_INTERVAL,
        }
    }

    /// Remote-tracking ref of the root target, e.g. `origin/main`
    pub fn target_ref(&self) -> String {
        format!("{}/{}", self.remote, self.root_target)
    }

    /// Prefix shared by every source branch of this stack
    pub fn branch_prefix(&self) -> String {
        format!("{}-", self.local_branch)
    }

    /// Source branch for an identifier: `<local-branch>-<suffix>`
    pub fn source_branch_for(&self, change_id: &ChangeId) -> String {
        format!("{}{}", self.branch_prefix(), change_id.branch_suffix())
    }
}

/// Settings given on the command line; they win over every file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--target`
    pub target_branch: Option<String>,
    /// `--keep-branches`
    pub keep_branches: bool,
    /// `--close-orphans`
    pub close_orphans: bool,
}

/// Resolve the final config
///
/// Priority: overrides, file settings, the branch's git upstream, defaults.
pub fn resolve_config(
    remote: &str,
    local_branch: &str,
    settings: &RemoteSettings,
    upstream: Option<&str>,
    overrides: &ConfigOverrides,
) -> ChainConfig {
    let root_target = overrides
        .target_branch
        .as_deref()
        .or(settings.target_branch.as_deref())
        .or(upstream)
        .unwrap_or(DEFAULT_TARGET_BRANCH);

    let mut config = ChainConfig::new(remote, local_branch, root_target);

    if let Some(delete) = settings.delete_source_branch {
        config.delete_source_branch = delete;
    }
    if overrides.keep_branches {
        config.delete_source_branch = false;
    }
    if let Some(policy) = settings.orphans {
        config.orphan_policy = policy;
    }
    if overrides.close_orphans {
        config.orphan_policy = OrphanPolicy::Close;
    }
    if let Some(ref key) = settings.trailer_key {
        config.trailer_key.clone_from(key);
    }
    if let Some(cancel) = settings.cancel_stale_pipelines {
        config.cancel_stale_pipelines = cancel;
    }
    if let Some(attempts) = settings.merge_poll_attempts {
        config.merge_poll_attempts = attempts;
    }
    if let Some(secs) = settings.merge_poll_interval_secs {
        config.merge_poll_interval = Duration::from_secs(secs);
    }

    config
}
