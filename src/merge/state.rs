//! Merge state - pure per-entry state machine and report

use crate::types::{ChangeId, Mergeable};
use std::fmt;

/// State of one chain entry during a merge walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Not attempted (yet)
    Pending,
    /// Merged into the root target
    Merged,
    /// Not mergeable; the walk stopped here
    Blocked,
    /// Merge was attempted and failed; the walk stopped here
    Failed,
}

impl EntryState {
    /// Whether the walk stops at this state
    pub const fn is_stop(self) -> bool {
        matches!(self, Self::Blocked | Self::Failed)
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Merged => write!(f, "merged"),
            Self::Blocked => write!(f, "blocked"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What to do next with an entry given its mergeable flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Merge it
    Merge,
    /// Status not computed yet; check again
    Wait,
    /// Give up on it
    Block,
}

/// Decide from a mergeable flag and how many re-checks remain (PURE)
pub const fn decide(mergeable: Mergeable, checks_left: u32) -> MergeDecision {
    match mergeable {
        Mergeable::Yes => MergeDecision::Merge,
        Mergeable::No => MergeDecision::Block,
        Mergeable::Unknown if checks_left > 0 => MergeDecision::Wait,
        Mergeable::Unknown => MergeDecision::Block,
    }
}

/// Outcome for one entry
#[derive(Debug, Clone)]
pub struct EntryOutcome {
    /// Position in the chain
    pub position: usize,
    /// Identifier
    pub change_id: ChangeId,
    /// Merge request id
    pub iid: u64,
    /// Merge request URL
    pub web_url: String,
    /// Source branch
    pub source_branch: String,
    /// Final state
    pub state: EntryState,
    /// Why the entry stopped the walk
    pub reason: Option<String>,
    /// Merge commit, when merged
    pub merge_sha: Option<String>,
}

impl EntryOutcome {
    /// Mark merged
    pub fn merged(&mut self, sha: Option<String>) {
        self.state = EntryState::Merged;
        self.merge_sha = sha;
    }

    /// Mark blocked with a reason
    pub fn blocked(&mut self, reason: impl Into<String>) {
        self.state = EntryState::Blocked;
        self.reason = Some(reason.into());
    }

    /// Mark failed with a reason
    pub fn failed(&mut self, reason: impl Into<String>) {
        self.state = EntryState::Failed;
        self.reason = Some(reason.into());
    }
}

/// Result of a merge walk
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// One outcome per chain entry, root to tip
    pub outcomes: Vec<EntryOutcome>,
}

impl MergeReport {
    /// True when every entry merged
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.state == EntryState::Merged)
    }

    /// Entries that merged, in order
    pub fn merged(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == EntryState::Merged)
    }

    /// The entry the walk stopped at, if any
    #[must_use]
    pub fn first_stop(&self) -> Option<&EntryOutcome> {
        self.outcomes.iter().find(|o| o.state.is_stop())
    }
}
