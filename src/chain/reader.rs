//! Remote chain reader
//!
//! Maps each local identifier to at most one open merge request and collects
//! the open merge requests of this stack that no local commit claims.

use crate::config::ChainConfig;
use crate::error::{Error, Result};
use crate::platform::ReviewService;
use crate::types::{ChangeId, CommitDescriptor, ReviewRecord, ReviewState};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Remote view of the stack
#[derive(Debug, Clone, Default)]
pub struct RemoteChain {
    /// Open record per identifier; identifiers without one are new
    pub records: HashMap<ChangeId, ReviewRecord>,
    /// Open records of this stack whose identifier left the local stack
    pub orphans: Vec<ReviewRecord>,
}

impl RemoteChain {
    /// Existing record for an identifier
    pub fn record_for(&self, change_id: &ChangeId) -> Option<&ReviewRecord> {
        self.records.get(change_id)
    }
}

/// Pick the record an identifier maps to from all records carrying it
///
/// Zero open records means new, one is reused, more is ambiguous. An
/// identifier that only has merged records belongs to history the local
/// branch has not been rebased past yet.
pub fn select_record(
    change_id: &ChangeId,
    candidates: Vec<ReviewRecord>,
) -> Result<Option<ReviewRecord>> {
    let (mut open, rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|r| r.state == ReviewState::Open);

    match open.len() {
        0 => match rest.iter().find(|r| r.state == ReviewState::Merged) {
            Some(merged) => Err(Error::StaleIdentifier {
                change_id: change_id.to_string(),
                iid: merged.iid,
            }),
            None => Ok(None),
        },
        1 => Ok(open.pop()),
        _ => {
            let mut iids: Vec<u64> = open.iter().map(|r| r.iid).collect();
            iids.sort_unstable();
            Err(Error::AmbiguousMatch {
                change_id: change_id.to_string(),
                iids,
            })
        }
    }
}

/// Whether an open record belongs to this stack but lost its commit
///
/// The source branch must be exactly the one this stack derives for the
/// record's identifier. A shared prefix is not enough: `feature-ui-<id>`
/// belongs to the `feature-ui` stack, not to `feature`.
fn is_orphan(record: &ReviewRecord, local: &HashSet<&ChangeId>, config: &ChainConfig) -> bool {
    record.change_id.as_ref().is_some_and(|id| {
        !local.contains(id) && record.source_branch == config.source_branch_for(id)
    })
}

/// Read the remote state for a commit stack
///
/// Lookups run one identifier at a time in stack order.
pub async fn read_remote_chain(
    service: &dyn ReviewService,
    commits: &[CommitDescriptor],
    config: &ChainConfig,
) -> Result<RemoteChain> {
    let mut records = HashMap::new();

    for commit in commits {
        let candidates = service.find_reviews(&commit.change_id).await?;
        if let Some(record) = select_record(&commit.change_id, candidates)? {
            debug!(
                change_id = %commit.change_id,
                mr_iid = record.iid,
                mergeable = %record.mergeable,
                "matched existing MR"
            );
            records.insert(commit.change_id.clone(), record);
        }
    }

    let local: HashSet<&ChangeId> = commits.iter().map(|c| &c.change_id).collect();
    let matched: HashSet<u64> = records.values().map(|r| r.iid).collect();

    let orphans: Vec<ReviewRecord> = service
        .list_open_reviews()
        .await?
        .into_iter()
        .filter(|r| !matched.contains(&r.iid) && is_orphan(r, &local, config))
        .collect();

    debug!(
        matched = records.len(),
        orphans = orphans.len(),
        "read remote chain"
    );

    Ok(RemoteChain { records, orphans })
}
