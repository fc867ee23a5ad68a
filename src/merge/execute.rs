//! Merge execution - effectful operations
//!
//! Walks synchronized entries root to tip. Each entry merges only after its
//! predecessor did; the first blocked or failed entry ends the walk and
//! everything after it stays pending.

use crate::chain::{Phase, ProgressCallback, SyncedEntry};
use crate::config::ChainConfig;
use crate::merge::state::{EntryOutcome, EntryState, MergeDecision, MergeReport, decide};
use crate::platform::ReviewService;
use crate::types::{Mergeable, ReviewRecord, ReviewState, ReviewUpdate};
use tracing::{debug, info};

/// Why an entry stopped the walk
enum Stop {
    Blocked(String),
    Failed(String),
}

fn pending_outcome(entry: &SyncedEntry) -> EntryOutcome {
    EntryOutcome {
        position: entry.position,
        change_id: entry.change_id.clone(),
        iid: entry.record.iid,
        web_url: entry.record.web_url.clone(),
        source_branch: entry.record.source_branch.clone(),
        state: EntryState::Pending,
        reason: None,
        merge_sha: None,
    }
}

/// Execute the merge walk (EFFECTFUL)
///
/// After each merge, pending entries that targeted the merged branch are
/// retargeted to the root, and only then is the merged branch deleted.
pub async fn execute_merge(
    entries: &[SyncedEntry],
    service: &dyn ReviewService,
    config: &ChainConfig,
    progress: &dyn ProgressCallback,
) -> MergeReport {
    progress.on_phase(Phase::Merging).await;

    let mut outcomes: Vec<EntryOutcome> = entries.iter().map(pending_outcome).collect();
    let mut records: Vec<ReviewRecord> = entries.iter().map(|e| e.record.clone()).collect();
    let mut touched: Vec<bool> = entries.iter().map(SyncedEntry::touched).collect();

    'walk: for i in 0..entries.len() {
        match merge_one(&mut records[i], touched[i], service, config, progress).await {
            Ok(sha) => outcomes[i].merged(sha),
            Err(Stop::Blocked(reason)) => {
                info!(mr_iid = records[i].iid, %reason, "merge blocked");
                outcomes[i].blocked(reason);
                break;
            }
            Err(Stop::Failed(reason)) => {
                info!(mr_iid = records[i].iid, %reason, "merge failed");
                outcomes[i].failed(reason);
                break;
            }
        }
        progress.on_review_merged(&records[i]).await;

        let merged_branch = records[i].source_branch.clone();
        for j in i + 1..entries.len() {
            if records[j].target_branch != merged_branch {
                continue;
            }
            match service
                .update_review(records[j].iid, &ReviewUpdate::retarget(&config.root_target))
                .await
            {
                Ok(updated) => {
                    progress.on_review_updated(&updated).await;
                    records[j] = updated;
                    touched[j] = true;
                }
                Err(e) => {
                    progress.on_error(&e).await;
                    outcomes[j].failed(format!("retarget to {} failed: {e}", config.root_target));
                    break 'walk;
                }
            }
        }

        if config.delete_source_branch
            && let Err(e) = service.delete_branch(&merged_branch).await
        {
            progress.on_error(&e).await;
        }
    }

    MergeReport { outcomes }
}

/// Bring one entry to a merge and perform it
async fn merge_one(
    record: &mut ReviewRecord,
    mut stale: bool,
    service: &dyn ReviewService,
    config: &ChainConfig,
    progress: &dyn ProgressCallback,
) -> Result<Option<String>, Stop> {
    let failed = |e: crate::error::Error| Stop::Failed(e.to_string());

    if record.target_branch != config.root_target {
        debug!(mr_iid = record.iid, target = %config.root_target, "retargeting to root before merge");
        *record = service
            .update_review(record.iid, &ReviewUpdate::retarget(&config.root_target))
            .await
            .map_err(failed)?;
        stale = true;
    }

    if stale || record.mergeable == Mergeable::Unknown {
        *record = service.get_review(record.iid).await.map_err(failed)?;
    }

    match record.state {
        ReviewState::Merged => return Ok(None),
        ReviewState::Closed => return Err(Stop::Failed("merge request is closed".to_string())),
        ReviewState::Open => {}
    }

    let mut checks_left = config.merge_poll_attempts;
    loop {
        match decide(record.mergeable, checks_left) {
            MergeDecision::Merge => break,
            MergeDecision::Block if record.mergeable == Mergeable::Unknown => {
                return Err(Stop::Blocked(format!(
                    "merge status still unknown after {} checks",
                    config.merge_poll_attempts
                )));
            }
            MergeDecision::Block => return Err(Stop::Blocked("not mergeable".to_string())),
            MergeDecision::Wait => {
                debug!(mr_iid = record.iid, checks_left, "merge status unknown, waiting");
                tokio::time::sleep(config.merge_poll_interval).await;
                checks_left -= 1;
                *record = service.get_review(record.iid).await.map_err(failed)?;
            }
        }
    }

    progress
        .on_message(&format!("Merging !{}: {}", record.iid, record.title))
        .await;
    match service.merge_review(record.iid).await {
        Ok(result) if result.merged => {
            record.state = ReviewState::Merged;
            Ok(result.sha)
        }
        Ok(result) => Err(Stop::Failed(
            result
                .message
                .unwrap_or_else(|| "merge request was not merged".to_string()),
        )),
        Err(e) => Err(failed(e)),
    }
}
