//! Error types for mr-chain

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building, synchronizing or merging a chain
#[derive(Debug, Error)]
pub enum Error {
    /// The local branch has no commits ahead of the root target
    #[error("no local commits ahead of {target} on {branch}")]
    NoCommitsAhead {
        /// Local branch that was inspected
        branch: String,
        /// Root target ref the branch was compared against
        target: String,
    },

    /// A commit in the stack carries no persistent identifier trailer
    #[error("commit {sha} ({subject}) has no Change-Id trailer; is the commit-msg hook installed?")]
    MissingIdentifier {
        /// Commit hash
        sha: String,
        /// Commit subject line
        subject: String,
    },

    /// Two commits in the stack share the same identifier
    #[error("Change-Id {change_id} is used by both {first} and {second}")]
    DuplicateIdentifier {
        /// The shared identifier
        change_id: String,
        /// First commit carrying it (oldest)
        first: String,
        /// Second commit carrying it
        second: String,
    },

    /// The stack contains a merge commit
    #[error("commit {sha} is a merge commit; only linear stacks are supported")]
    NonLinearStack {
        /// Offending commit
        sha: String,
    },

    /// A local commit maps to a review that was already merged
    #[error("Change-Id {change_id} was already merged in !{iid}; rebase onto the target branch first")]
    StaleIdentifier {
        /// The identifier
        change_id: String,
        /// The merged record
        iid: u64,
    },

    /// More than one open review claims the same identifier
    #[error("Change-Id {change_id} matches several open merge requests: {iids:?}")]
    AmbiguousMatch {
        /// The identifier
        change_id: String,
        /// All matching records
        iids: Vec<u64>,
    },

    /// Two commits of the stack would share one source branch
    #[error("Change-Ids {first} and {second} both map to branch {branch}; reword one of the Change-Ids")]
    BranchCollision {
        /// The shared source branch
        branch: String,
        /// Identifier of the earlier commit
        first: String,
        /// Identifier of the later commit
        second: String,
    },

    /// The remote branch moved since it was last read
    #[error("remote branch {branch} changed unexpectedly; fetch and retry")]
    StalePush {
        /// Source branch that was rejected
        branch: String,
    },

    /// HEAD is not on a branch
    #[error("HEAD is detached; are you in the middle of a rebase?")]
    DetachedHead,

    /// Requested git remote is not configured
    #[error("git remote not found: {0}")]
    RemoteNotFound(String),

    /// Git command failed
    #[error("git error: {0}")]
    Git(String),

    /// GitLab API returned an error
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// Review service failure not specific to one backend
    #[error("platform error: {0}")]
    Platform(String),

    /// Authentication could not be resolved
    #[error("authentication error: {0}")]
    Auth(String),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),

    /// Could not parse input (URL, trailer, ...)
    #[error("parse error: {0}")]
    Parse(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violated
    #[error("internal error: {0}")]
    Internal(String),
}
