//! Chain planning - pure reconciliation of local commits with remote records
//!
//! No I/O happens here. All data is passed in, making it easy to unit test.

use crate::chain::reader::RemoteChain;
use crate::config::ChainConfig;
use crate::error::{Error, Result};
use crate::types::{ChangeId, CommitDescriptor, ReviewRecord, ReviewState};
use std::collections::HashMap;
use std::fmt;

/// What the synchronizer must do for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainAction {
    /// No record yet: push the branch and create one
    Create,
    /// Commit content changed: update the record and force-push
    UpdateContent,
    /// Content unchanged but the target moved
    Retarget,
    /// Already in sync
    Noop,
}

impl fmt::Display for ChainAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::UpdateContent => write!(f, "update"),
            Self::Retarget => write!(f, "retarget"),
            Self::Noop => write!(f, "unchanged"),
        }
    }
}

/// One link of the chain
#[derive(Debug, Clone)]
pub struct ChainEntry {
    /// Position in the stack, 0 = closest to the root target
    pub position: usize,
    /// Local commit
    pub commit: CommitDescriptor,
    /// Open record for the commit's identifier, if any
    pub existing: Option<ReviewRecord>,
    /// Source branch the record uses
    pub source_branch: String,
    /// Target branch the record must use
    pub target_branch: String,
    /// Action to take
    pub action: ChainAction,
}

impl fmt::Display for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<9} {} -> {}  {} {}",
            self.action.to_string(),
            self.source_branch,
            self.target_branch,
            self.commit.short_sha(),
            self.commit.subject
        )?;
        if let Some(ref record) = self.existing {
            write!(f, " (!{})", record.iid)?;
        }
        Ok(())
    }
}

/// Chain plan - output of the reconciler
#[derive(Debug, Clone)]
pub struct ChainPlan {
    /// Entries root to tip
    pub entries: Vec<ChainEntry>,
    /// Open records no longer claimed by a local commit
    pub orphans: Vec<ReviewRecord>,
    /// Target of the first entry
    pub root_target: String,
}

impl ChainPlan {
    /// True when no entry needs a remote write
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.entries.iter().all(|e| e.action == ChainAction::Noop)
    }

    /// Number of entries with a given action
    #[must_use]
    pub fn count(&self, action: ChainAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }
}

/// Decide the action for one commit given its record and desired target
fn decide_action(
    commit: &CommitDescriptor,
    existing: Option<&ReviewRecord>,
    target_branch: &str,
) -> ChainAction {
    match existing {
        None => ChainAction::Create,
        Some(record) if record.head_sha.as_deref() != Some(commit.sha.as_str()) => {
            ChainAction::UpdateContent
        }
        Some(record) if record.target_branch != target_branch => ChainAction::Retarget,
        Some(_) => ChainAction::Noop,
    }
}

/// Reconcile local commits with the remote chain (PURE)
///
/// Targets follow the chain recurrence on the new plan: the first entry
/// targets the root, every other entry targets its predecessor's source
/// branch. Records keep their source branch; new ones get the branch derived
/// from their identifier. Two entries sharing a source branch would make
/// one target itself, so that is rejected before anything is written.
pub fn plan_chain(
    commits: &[CommitDescriptor],
    remote: &RemoteChain,
    config: &ChainConfig,
) -> Result<ChainPlan> {
    let mut entries: Vec<ChainEntry> = Vec::with_capacity(commits.len());
    let mut branches: HashMap<String, &ChangeId> = HashMap::new();

    for (position, commit) in commits.iter().enumerate() {
        let existing = remote.record_for(&commit.change_id);

        if let Some(record) = existing
            && record.state == ReviewState::Merged
        {
            return Err(Error::StaleIdentifier {
                change_id: commit.change_id.to_string(),
                iid: record.iid,
            });
        }

        let source_branch = existing.map_or_else(
            || config.source_branch_for(&commit.change_id),
            |r| r.source_branch.clone(),
        );
        if let Some(first) = branches.insert(source_branch.clone(), &commit.change_id) {
            return Err(Error::BranchCollision {
                branch: source_branch,
                first: first.to_string(),
                second: commit.change_id.to_string(),
            });
        }

        let target_branch = entries
            .last()
            .map_or_else(|| config.root_target.clone(), |prev| prev.source_branch.clone());
        let action = decide_action(commit, existing, &target_branch);

        entries.push(ChainEntry {
            position,
            commit: commit.clone(),
            existing: existing.cloned(),
            source_branch,
            target_branch,
            action,
        });
    }

    Ok(ChainPlan {
        entries,
        orphans: remote.orphans.clone(),
        root_target: config.root_target.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mergeable;

    fn commit(position: usize, id: &str, sha: &str) -> CommitDescriptor {
        CommitDescriptor {
            sha: sha.to_string(),
            subject: format!("commit {id}"),
            message: format!("commit {id}\n\nChange-Id: {id}"),
            change_id: ChangeId::new(id),
            position,
        }
    }

    fn record(iid: u64, source: &str, target: &str, sha: &str) -> ReviewRecord {
        ReviewRecord {
            iid,
            web_url: format!("https://gitlab.com/g/r/-/merge_requests/{iid}"),
            source_branch: source.to_string(),
            target_branch: target.to_string(),
            change_id: None,
            state: ReviewState::Open,
            mergeable: Mergeable::Yes,
            head_sha: Some(sha.to_string()),
            title: String::new(),
            description: String::new(),
        }
    }

    fn config() -> ChainConfig {
        ChainConfig::new("origin", "feature", "main")
    }

    #[test]
    fn test_empty_remote_creates_linked_chain() {
        let commits = vec![
            commit(0, "Iaaaaaaaa01", "s1"),
            commit(1, "Ibbbbbbbb02", "s2"),
            commit(2, "Icccccccc03", "s3"),
        ];
        let plan = plan_chain(&commits, &RemoteChain::default(), &config()).unwrap();

        assert_eq!(plan.count(ChainAction::Create), 3);
        assert_eq!(plan.entries[0].source_branch, "feature-aaaaaaaa");
        assert_eq!(plan.entries[0].target_branch, "main");
        assert_eq!(plan.entries[1].target_branch, "feature-aaaaaaaa");
        assert_eq!(plan.entries[2].target_branch, "feature-bbbbbbbb");
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_existing_record_keeps_its_source_branch() {
        let commits = vec![commit(0, "Iaaaaaaaa01", "s1"), commit(1, "Ibbbbbbbb02", "s2")];
        let mut remote = RemoteChain::default();
        remote.records.insert(
            ChangeId::new("Iaaaaaaaa01"),
            record(1, "legacy-name", "main", "s1"),
        );

        let plan = plan_chain(&commits, &remote, &config()).unwrap();
        assert_eq!(plan.entries[0].action, ChainAction::Noop);
        assert_eq!(plan.entries[1].target_branch, "legacy-name");
    }

    #[test]
    fn test_action_decisions() {
        let c = commit(0, "I1", "new-sha");
        assert_eq!(decide_action(&c, None, "main"), ChainAction::Create);
        assert_eq!(
            decide_action(&c, Some(&record(1, "b", "main", "old-sha")), "main"),
            ChainAction::UpdateContent
        );
        assert_eq!(
            decide_action(&c, Some(&record(1, "b", "other", "new-sha")), "main"),
            ChainAction::Retarget
        );
        assert_eq!(
            decide_action(&c, Some(&record(1, "b", "main", "new-sha")), "main"),
            ChainAction::Noop
        );
    }

    #[test]
    fn test_unknown_head_counts_as_changed() {
        let c = commit(0, "I1", "sha");
        let mut r = record(1, "b", "main", "sha");
        r.head_sha = None;
        assert_eq!(decide_action(&c, Some(&r), "main"), ChainAction::UpdateContent);
    }

    #[test]
    fn test_merged_record_is_stale() {
        let commits = vec![commit(0, "I1", "s1")];
        let mut remote = RemoteChain::default();
        let mut merged = record(4, "feature-x", "main", "s1");
        merged.state = ReviewState::Merged;
        remote.records.insert(ChangeId::new("I1"), merged);

        let err = plan_chain(&commits, &remote, &config()).unwrap_err();
        assert!(matches!(err, Error::StaleIdentifier { iid: 4, .. }));
    }

    #[test]
    fn test_orphans_are_carried_not_planned() {
        let commits = vec![commit(0, "I1", "s1")];
        let remote = RemoteChain {
            orphans: vec![record(9, "feature-dead", "main", "s9")],
            ..RemoteChain::default()
        };
        let plan = plan_chain(&commits, &remote, &config()).unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.orphans.len(), 1);
        assert_eq!(plan.orphans[0].iid, 9);
    }

    #[test]
    fn test_shared_suffix_is_a_branch_collision() {
        let commits = vec![
            commit(0, "Iaaaaaaaa0000000000000000000000000000001", "s1"),
            commit(1, "Iaaaaaaaa0000000000000000000000000000002", "s2"),
        ];
        let err = plan_chain(&commits, &RemoteChain::default(), &config()).unwrap_err();
        match err {
            Error::BranchCollision { branch, first, second } => {
                assert_eq!(branch, "feature-aaaaaaaa");
                assert!(first.ends_with('1'));
                assert!(second.ends_with('2'));
            }
            other => panic!("expected BranchCollision, got {other:?}"),
        }
    }

    #[test]
    fn test_existing_branch_reused_by_new_commit_collides() {
        let commits = vec![commit(0, "Iaaaaaaaa01", "s1"), commit(1, "Ibbbbbbbb02", "s2")];
        let mut remote = RemoteChain::default();
        remote.records.insert(
            ChangeId::new("Iaaaaaaaa01"),
            record(1, "feature-bbbbbbbb", "main", "s1"),
        );

        let err = plan_chain(&commits, &remote, &config()).unwrap_err();
        assert!(matches!(err, Error::BranchCollision { ref branch, .. } if branch == "feature-bbbbbbbb"));
    }

    #[test]
    fn test_entry_display() {
        let commits = vec![commit(0, "Iaaaaaaaa01", "0123456789abcdef")];
        let plan = plan_chain(&commits, &RemoteChain::default(), &config()).unwrap();
        let line = plan.entries[0].to_string();
        assert!(line.starts_with("create"));
        assert!(line.contains("feature-aaaaaaaa -> main"));
        assert!(line.contains("01234567"));
    }
}
