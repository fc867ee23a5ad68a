//! Progress callback trait for interface-agnostic updates
//!
//! The synchronizer and merge orchestrator report through this trait so the
//! CLI can render output while tests stay silent.

use crate::error::Error;
use crate::types::ReviewRecord;
use async_trait::async_trait;

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Walking local commits
    Analyzing,
    /// Reading merge requests from the remote
    Reading,
    /// Computing the chain plan
    Planning,
    /// Pushing branches and updating merge requests
    Syncing,
    /// Applying the orphan policy
    Orphans,
    /// Merging the chain
    Merging,
    /// Done
    Complete,
}

/// Push operation status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    /// Push started
    Started,
    /// Push succeeded
    Success,
    /// Push failed with error message
    Failed(String),
}

/// Progress callback trait
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Called when entering a new phase
    async fn on_phase(&self, phase: Phase);

    /// Called when a source branch is being pushed
    async fn on_branch_push(&self, branch: &str, status: PushStatus);

    /// Called when a merge request is created
    async fn on_review_created(&self, record: &ReviewRecord);

    /// Called when a merge request is updated or retargeted
    async fn on_review_updated(&self, record: &ReviewRecord);

    /// Called when a merge request is merged
    async fn on_review_merged(&self, record: &ReviewRecord);

    /// Called when an error occurs (non-fatal)
    async fn on_error(&self, error: &Error);

    /// Called with a general status message
    async fn on_message(&self, message: &str);
}

/// No-op progress callback for testing or when progress isn't needed
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_phase(&self, _phase: Phase) {}
    async fn on_branch_push(&self, _branch: &str, _status: PushStatus) {}
    async fn on_review_created(&self, _record: &ReviewRecord) {}
    async fn on_review_updated(&self, _record: &ReviewRecord) {}
    async fn on_review_merged(&self, _record: &ReviewRecord) {}
    async fn on_error(&self, _error: &Error) {}
    async fn on_message(&self, _message: &str) {}
}
