//! Core types for mr-chain

use std::fmt;

/// Persistent identifier carried in a commit message trailer
///
/// Opaque to the engine. It survives amend and rebase as long as the
/// commit-msg hook preserves it, which makes it the durable key between a
/// local commit and its merge request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeId(String);

impl ChangeId {
    /// Wrap an identifier value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short, branch-safe suffix derived from the identifier
    ///
    /// Gerrit-style ids (`I` followed by hex) use the first 8 hex digits.
    /// Anything else is hashed so the suffix stays ref-safe.
    pub fn branch_suffix(&self) -> String {
        let hex = self.0.strip_prefix('I').unwrap_or(&self.0);
        if hex.len() >= 8 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return hex[..8].to_ascii_lowercase();
        }
        format!("{:08x}", fnv1a(self.0.as_bytes()) & 0xffff_ffff)
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Immutable snapshot of one local commit in the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDescriptor {
    /// Commit hash (content hash)
    pub sha: String,
    /// First line of the message
    pub subject: String,
    /// Full commit message
    pub message: String,
    /// Persistent identifier extracted from the message
    pub change_id: ChangeId,
    /// Position in the stack, 0 = oldest
    pub position: usize,
}

impl CommitDescriptor {
    /// Abbreviated hash for display
    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(8)]
    }
}

/// A raw commit as enumerated from git, before identifier extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    /// Commit hash
    pub sha: String,
    /// Full commit message
    pub message: String,
    /// Parent hashes
    pub parents: Vec<String>,
}

// =============================================================================
// Review records
// =============================================================================

/// Lifecycle state of a review record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    /// Open and awaiting merge
    Open,
    /// Merged into its target
    Merged,
    /// Closed without merging
    Closed,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Merged => write!(f, "merged"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Remote-reported mergeability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mergeable {
    /// Can be merged now
    Yes,
    /// Cannot be merged (conflicts, failing checks, missing approvals, ...)
    No,
    /// Remote has not finished computing the status
    Unknown,
}

impl fmt::Display for Mergeable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "mergeable"),
            Self::No => write!(f, "not mergeable"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Projection of a remote merge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    /// Project-scoped id (GitLab `iid`)
    pub iid: u64,
    /// Web URL
    pub web_url: String,
    /// Source branch
    pub source_branch: String,
    /// Target branch
    pub target_branch: String,
    /// Identifier parsed from the description marker
    pub change_id: Option<ChangeId>,
    /// Lifecycle state
    pub state: ReviewState,
    /// Mergeable flag
    pub mergeable: Mergeable,
    /// Head commit of the source branch as last seen by the remote
    pub head_sha: Option<String>,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
}

/// Fields for creating a review record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    /// Source branch
    pub source_branch: String,
    /// Target branch
    pub target_branch: String,
    /// Title
    pub title: String,
    /// Description, including the identifier marker
    pub description: String,
    /// Ask the remote to delete the source branch on merge
    pub remove_source_branch: bool,
}

/// Partial update of a review record; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewUpdate {
    /// New target branch
    pub target_branch: Option<String>,
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
}

impl ReviewUpdate {
    /// Update that only changes the target branch
    pub fn retarget(target: impl Into<String>) -> Self {
        Self {
            target_branch: Some(target.into()),
            ..Self::default()
        }
    }

    /// True when nothing would be sent
    pub const fn is_empty(&self) -> bool {
        self.target_branch.is_none() && self.title.is_none() && self.description.is_none()
    }
}

/// Result of a merge call
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Whether the merge happened
    pub merged: bool,
    /// Merge (or squash) commit, if reported
    pub sha: Option<String>,
    /// Message from the remote, mostly on failure
    pub message: Option<String>,
}

/// GitLab project coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Base URL of the host, e.g. `https://gitlab.com`
    pub host: String,
    /// Full project path, e.g. `group/subgroup/repo`
    pub project_path: String,
}
