//! Review service capability
//!
//! Provides the interface the reader, synchronizer and merge orchestrator use
//! to talk to the remote code review service, plus the GitLab implementation.

mod detection;
mod factory;
mod gitlab;

pub use detection::parse_remote_url;
pub use factory::create_review_service;
pub use gitlab::{GitLabService, mergeable_from_status};

use crate::error::Result;
use crate::types::{ChangeId, MergeResult, NewReview, ReviewRecord, ReviewUpdate};
use async_trait::async_trait;

/// Review service trait for merge request operations
///
/// Production code uses [`GitLabService`]; tests use an in-memory fake.
#[async_trait]
pub trait ReviewService: Send + Sync {
    /// All records (any state) whose description marker carries `change_id`
    async fn find_reviews(&self, change_id: &ChangeId) -> Result<Vec<ReviewRecord>>;

    /// All open records created by the authenticated user
    async fn list_open_reviews(&self) -> Result<Vec<ReviewRecord>>;

    /// Fresh copy of one record, including its mergeable flag
    async fn get_review(&self, iid: u64) -> Result<ReviewRecord>;

    /// Create a record
    async fn create_review(&self, review: &NewReview) -> Result<ReviewRecord>;

    /// Update target/title/description of a record
    async fn update_review(&self, iid: u64, update: &ReviewUpdate) -> Result<ReviewRecord>;

    /// Merge a record into its target
    ///
    /// A refusal by the remote (conflict, not mergeable any more) comes back
    /// as `merged: false`; transport problems are errors.
    async fn merge_review(&self, iid: u64) -> Result<MergeResult>;

    /// Close a record without merging
    async fn close_review(&self, iid: u64) -> Result<ReviewRecord>;

    /// Delete a branch on the remote; a missing branch is not an error
    async fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Cancel running pipelines of a record for commits other than `keep_sha`
    ///
    /// Returns how many were cancelled.
    async fn cancel_stale_pipelines(&self, iid: u64, keep_sha: &str) -> Result<usize>;
}
