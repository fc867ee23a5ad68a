//! Chain execution - effectful operations
//!
//! Takes a `ChainPlan` (created by the pure planner) and applies it root to
//! tip through git and the review service. The first failure aborts the rest
//! of the chain; nothing already written is rolled back.

use crate::chain::plan::{ChainAction, ChainEntry, ChainPlan};
use crate::chain::progress::{Phase, ProgressCallback, PushStatus};
use crate::config::{ChainConfig, OrphanPolicy};
use crate::error::{Error, Result};
use crate::git::{GitOps, PushLease};
use crate::platform::ReviewService;
use crate::stack::trailer::{description_with_marker, split_message};
use crate::types::{ChangeId, NewReview, ReviewRecord, ReviewUpdate};
use tracing::{debug, info};

/// A chain entry after synchronization
#[derive(Debug, Clone)]
pub struct SyncedEntry {
    /// Position in the chain
    pub position: usize,
    /// Identifier of the commit
    pub change_id: ChangeId,
    /// What was done
    pub action: ChainAction,
    /// Record as it stands after the write
    pub record: ReviewRecord,
}

impl SyncedEntry {
    /// Whether this run wrote to the record
    pub fn touched(&self) -> bool {
        self.action != ChainAction::Noop
    }
}

/// Where and why synchronization stopped
#[derive(Debug)]
pub struct SyncFailure {
    /// Position of the failing entry
    pub position: usize,
    /// Identifier of the failing entry
    pub change_id: ChangeId,
    /// Underlying error
    pub error: Error,
}

/// Result of synchronization
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Entries that completed, root to tip
    pub entries: Vec<SyncedEntry>,
    /// Orphans closed by the orphan policy
    pub orphans_closed: Vec<ReviewRecord>,
    /// Orphans left open
    pub orphans_left: Vec<ReviewRecord>,
    /// Pipelines cancelled for superseded commits
    pub pipelines_cancelled: usize,
    /// First failure, if the chain was aborted
    pub failure: Option<SyncFailure>,
}

impl SyncReport {
    fn with_action(&self, action: ChainAction) -> impl Iterator<Item = &SyncedEntry> {
        self.entries.iter().filter(move |e| e.action == action)
    }

    /// Entries whose record was created
    pub fn created(&self) -> impl Iterator<Item = &SyncedEntry> {
        self.with_action(ChainAction::Create)
    }

    /// Entries whose content was updated
    pub fn updated(&self) -> impl Iterator<Item = &SyncedEntry> {
        self.with_action(ChainAction::UpdateContent)
    }

    /// Entries that were only retargeted
    pub fn retargeted(&self) -> impl Iterator<Item = &SyncedEntry> {
        self.with_action(ChainAction::Retarget)
    }

    /// Entries left as they were
    pub fn unchanged(&self) -> impl Iterator<Item = &SyncedEntry> {
        self.with_action(ChainAction::Noop)
    }

    /// True when every entry completed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Execute the chain plan (EFFECTFUL)
///
/// Per entry, in order: `Create` force-pushes and creates the record,
/// `UpdateContent` updates the record then pushes with a lease on the
/// record's head, `Retarget` changes only the target, `Noop` does nothing.
/// The orphan policy runs only when the whole chain went through.
pub async fn execute_chain(
    plan: &ChainPlan,
    git: &dyn GitOps,
    service: &dyn ReviewService,
    config: &ChainConfig,
    progress: &dyn ProgressCallback,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    progress.on_phase(Phase::Syncing).await;
    for entry in &plan.entries {
        match sync_entry(entry, git, service, config, progress).await {
            Ok((record, cancelled)) => {
                report.pipelines_cancelled += cancelled;
                report.entries.push(SyncedEntry {
                    position: entry.position,
                    change_id: entry.commit.change_id.clone(),
                    action: entry.action,
                    record,
                });
            }
            Err(error) => {
                progress.on_error(&error).await;
                info!(
                    position = entry.position,
                    change_id = %entry.commit.change_id,
                    %error,
                    "chain aborted"
                );
                report.failure = Some(SyncFailure {
                    position: entry.position,
                    change_id: entry.commit.change_id.clone(),
                    error,
                });
                report.orphans_left.clone_from(&plan.orphans);
                return Ok(report);
            }
        }
    }

    progress.on_phase(Phase::Orphans).await;
    apply_orphan_policy(&plan.orphans, service, config, progress, &mut report).await;

    progress.on_phase(Phase::Complete).await;
    Ok(report)
}

/// Title and marked description for a commit
fn review_text(entry: &ChainEntry, trailer_key: &str) -> (String, String) {
    let (title, body) = split_message(&entry.commit.message, trailer_key);
    let description = description_with_marker(&body, &entry.commit.change_id, trailer_key);
    (title, description)
}

async fn sync_entry(
    entry: &ChainEntry,
    git: &dyn GitOps,
    service: &dyn ReviewService,
    config: &ChainConfig,
    progress: &dyn ProgressCallback,
) -> Result<(ReviewRecord, usize)> {
    let existing = || {
        entry.existing.clone().ok_or_else(|| {
            Error::Internal(format!(
                "{} planned without an existing record for {}",
                entry.action, entry.commit.change_id
            ))
        })
    };

    match entry.action {
        ChainAction::Create => {
            push(git, config, entry, PushLease::Force, progress).await?;

            let (title, description) = review_text(entry, &config.trailer_key);
            let record = service
                .create_review(&NewReview {
                    source_branch: entry.source_branch.clone(),
                    target_branch: entry.target_branch.clone(),
                    title,
                    description,
                    remove_source_branch: config.delete_source_branch,
                })
                .await?;
            progress.on_review_created(&record).await;
            Ok((record, 0))
        }
        ChainAction::UpdateContent => {
            let mut record = existing()?;
            let (title, description) = review_text(entry, &config.trailer_key);
            let update = ReviewUpdate {
                target_branch: (record.target_branch != entry.target_branch)
                    .then(|| entry.target_branch.clone()),
                title: (record.title != title).then_some(title),
                description: (record.description != description).then_some(description),
            };
            if !update.is_empty() {
                record = service.update_review(record.iid, &update).await?;
            }

            let lease = entry
                .existing
                .as_ref()
                .and_then(|r| r.head_sha.clone())
                .map_or(PushLease::Force, PushLease::Expect);
            push(git, config, entry, lease, progress).await?;
            record.head_sha = Some(entry.commit.sha.clone());

            // Pipeline cleanup never fails the entry
            let cancelled = if config.cancel_stale_pipelines {
                match service
                    .cancel_stale_pipelines(record.iid, &entry.commit.sha)
                    .await
                {
                    Ok(n) => n,
                    Err(e) => {
                        progress.on_error(&e).await;
                        debug!(mr_iid = record.iid, error = %e, "stale pipeline cancellation failed");
                        0
                    }
                }
            } else {
                0
            };

            progress.on_review_updated(&record).await;
            Ok((record, cancelled))
        }
        ChainAction::Retarget => {
            let record = existing()?;
            debug!(
                mr_iid = record.iid,
                from = %record.target_branch,
                to = %entry.target_branch,
                "retargeting"
            );
            let record = service
                .update_review(record.iid, &ReviewUpdate::retarget(&entry.target_branch))
                .await?;
            progress.on_review_updated(&record).await;
            Ok((record, 0))
        }
        ChainAction::Noop => Ok((existing()?, 0)),
    }
}

async fn push(
    git: &dyn GitOps,
    config: &ChainConfig,
    entry: &ChainEntry,
    lease: PushLease,
    progress: &dyn ProgressCallback,
) -> Result<()> {
    progress
        .on_branch_push(&entry.source_branch, PushStatus::Started)
        .await;
    match git
        .push(&config.remote, &entry.commit.sha, &entry.source_branch, lease)
        .await
    {
        Ok(()) => {
            progress
                .on_branch_push(&entry.source_branch, PushStatus::Success)
                .await;
            Ok(())
        }
        Err(e) => {
            progress
                .on_branch_push(&entry.source_branch, PushStatus::Failed(e.to_string()))
                .await;
            Err(e)
        }
    }
}

/// Close or report orphans; failures here are reported, not fatal
async fn apply_orphan_policy(
    orphans: &[ReviewRecord],
    service: &dyn ReviewService,
    config: &ChainConfig,
    progress: &dyn ProgressCallback,
    report: &mut SyncReport,
) {
    for orphan in orphans {
        if config.orphan_policy == OrphanPolicy::Leave {
            progress
                .on_message(&format!(
                    "!{} ({}) is no longer in the local stack; leaving it open",
                    orphan.iid, orphan.source_branch
                ))
                .await;
            report.orphans_left.push(orphan.clone());
            continue;
        }

        match close_orphan(orphan, service, config).await {
            Ok(closed) => {
                progress
                    .on_message(&format!("Closed orphaned !{}", closed.iid))
                    .await;
                report.orphans_closed.push(closed);
            }
            Err(e) => {
                progress.on_error(&e).await;
                report.orphans_left.push(orphan.clone());
            }
        }
    }
}

async fn close_orphan(
    orphan: &ReviewRecord,
    service: &dyn ReviewService,
    config: &ChainConfig,
) -> Result<ReviewRecord> {
    debug!(mr_iid = orphan.iid, "closing orphan");
    let closed = service.close_review(orphan.iid).await?;
    if config.delete_source_branch {
        service.delete_branch(&orphan.source_branch).await?;
    }
    Ok(closed)
}
