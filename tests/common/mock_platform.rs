//! In-memory review service and git for testing
//!
//! `MockReviewService` keeps merge requests and remote branches in memory and
//! behaves like GitLab for the calls the engine makes. `MockGit` pushes into
//! the same remote, so a record's head follows its source branch. Both append
//! to one ordered call log, which lets tests check write ordering.

#![allow(dead_code)]

use async_trait::async_trait;
use mr_chain::error::{Error, Result};
use mr_chain::git::{GitOps, PushLease};
use mr_chain::platform::ReviewService;
use mr_chain::stack::trailer::{DEFAULT_TRAILER_KEY, description_with_marker, marker_change_id};
use mr_chain::types::{
    ChangeId, MergeResult, Mergeable, NewReview, RawCommit, ReviewRecord, ReviewState,
    ReviewUpdate,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One call made against the fake remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(ChangeId),
    ListOpen,
    Get(u64),
    Create(NewReview),
    Update(u64, ReviewUpdate),
    Merge(u64),
    Close(u64),
    DeleteBranch(String),
    CancelPipelines(u64, String),
    Push {
        branch: String,
        sha: String,
        lease: PushLease,
    },
}

#[derive(Debug, Clone)]
struct Pipeline {
    iid: u64,
    sha: String,
    running: bool,
}

/// In-memory GitLab stand-in
pub struct MockReviewService {
    next_iid: AtomicU64,
    records: Mutex<BTreeMap<u64, ReviewRecord>>,
    branches: Mutex<HashMap<String, String>>,
    pipelines: Mutex<Vec<Pipeline>>,
    /// Mergeable values handed out by successive `get_review` calls
    mergeable_queue: Mutex<HashMap<u64, VecDeque<Mergeable>>>,
    default_mergeable: Mutex<Mergeable>,
    // Call tracking
    calls: Mutex<Vec<Call>>,
    // Error injection
    error_on_find: Mutex<Option<String>>,
    error_on_create: Mutex<Option<String>>,
    error_on_update: Mutex<HashSet<u64>>,
    error_on_merge: Mutex<HashMap<u64, String>>,
    refuse_merge: Mutex<HashMap<u64, String>>,
    error_on_push: Mutex<HashSet<String>>,
    error_on_cancel: Mutex<HashSet<u64>>,
}

impl Default for MockReviewService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReviewService {
    /// Empty remote
    pub fn new() -> Self {
        Self {
            next_iid: AtomicU64::new(1),
            records: Mutex::new(BTreeMap::new()),
            branches: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(Vec::new()),
            mergeable_queue: Mutex::new(HashMap::new()),
            default_mergeable: Mutex::new(Mergeable::Yes),
            calls: Mutex::new(Vec::new()),
            error_on_find: Mutex::new(None),
            error_on_create: Mutex::new(None),
            error_on_update: Mutex::new(HashSet::new()),
            error_on_merge: Mutex::new(HashMap::new()),
            refuse_merge: Mutex::new(HashMap::new()),
            error_on_push: Mutex::new(HashSet::new()),
            error_on_cancel: Mutex::new(HashSet::new()),
        }
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn web_url(iid: u64) -> String {
        format!("https://gitlab.com/group/repo/-/merge_requests/{iid}")
    }

    // === Seeding ===

    /// Add a record as if an earlier run had created it; the source branch
    /// points at `head_sha`
    pub fn seed_record(
        &self,
        change_id: &str,
        source_branch: &str,
        target_branch: &str,
        head_sha: &str,
        state: ReviewState,
    ) -> u64 {
        let iid = self.next_iid.fetch_add(1, Ordering::SeqCst);
        let id = ChangeId::new(change_id);
        let record = ReviewRecord {
            iid,
            web_url: Self::web_url(iid),
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            change_id: Some(id.clone()),
            state,
            mergeable: *self.default_mergeable.lock().unwrap(),
            head_sha: Some(head_sha.to_string()),
            title: format!("commit {change_id}"),
            description: description_with_marker("", &id, DEFAULT_TRAILER_KEY),
        };
        self.records.lock().unwrap().insert(iid, record);
        self.branches
            .lock()
            .unwrap()
            .insert(source_branch.to_string(), head_sha.to_string());
        iid
    }

    /// Move a remote branch behind the tool's back
    pub fn move_branch(&self, branch: &str, sha: &str) {
        self.branches
            .lock()
            .unwrap()
            .insert(branch.to_string(), sha.to_string());
    }

    /// Register a running pipeline for a record
    pub fn add_running_pipeline(&self, iid: u64, sha: &str) {
        self.pipelines.lock().unwrap().push(Pipeline {
            iid,
            sha: sha.to_string(),
            running: true,
        });
    }

    // === Merge status ===

    /// Mergeable flag for records created from now on
    pub fn set_default_mergeable(&self, mergeable: Mergeable) {
        *self.default_mergeable.lock().unwrap() = mergeable;
    }

    /// Set a record's mergeable flag
    pub fn set_mergeable(&self, iid: u64, mergeable: Mergeable) {
        if let Some(r) = self.records.lock().unwrap().get_mut(&iid) {
            r.mergeable = mergeable;
        }
    }

    /// Values successive `get_review` calls report before settling
    pub fn queue_mergeable(&self, iid: u64, values: &[Mergeable]) {
        self.mergeable_queue
            .lock()
            .unwrap()
            .insert(iid, values.iter().copied().collect());
    }

    // === Error injection methods ===

    /// Make `find_reviews` return an error
    pub fn fail_find(&self, msg: &str) {
        *self.error_on_find.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `create_review` return an error
    pub fn fail_create(&self, msg: &str) {
        *self.error_on_create.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `update_review` fail for one record
    pub fn fail_update(&self, iid: u64) {
        self.error_on_update.lock().unwrap().insert(iid);
    }

    /// Make `merge_review` return an error for one record
    pub fn fail_merge(&self, iid: u64, msg: &str) {
        self.error_on_merge
            .lock()
            .unwrap()
            .insert(iid, msg.to_string());
    }

    /// Make `merge_review` answer "not merged" for one record
    pub fn refuse_merge(&self, iid: u64, msg: &str) {
        self.refuse_merge
            .lock()
            .unwrap()
            .insert(iid, msg.to_string());
    }

    /// Make pushes to a branch fail
    pub fn fail_push(&self, branch: &str) {
        self.error_on_push.lock().unwrap().insert(branch.to_string());
    }

    /// Make pipeline cancellation for a record fail
    pub fn fail_cancel_pipelines(&self, iid: u64) {
        self.error_on_cancel.lock().unwrap().insert(iid);
    }

    // === Inspection ===

    /// Ordered call log
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget calls made so far
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Calls that write remote state
    pub fn write_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Find(_) | Call::ListOpen | Call::Get(_)))
            .collect()
    }

    /// Snapshot of a record
    pub fn record(&self, iid: u64) -> ReviewRecord {
        self.records.lock().unwrap()[&iid].clone()
    }

    /// Open record for a source branch
    pub fn record_by_branch(&self, branch: &str) -> Option<ReviewRecord> {
        self.records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.source_branch == branch && r.state == ReviewState::Open)
            .cloned()
    }

    /// Commit a remote branch points at
    pub fn branch_head(&self, branch: &str) -> Option<String> {
        self.branches.lock().unwrap().get(branch).cloned()
    }

    pub fn assert_no_calls(&self) {
        assert!(self.calls().is_empty(), "expected no calls, got {:?}", self.calls());
    }

    pub fn assert_merged(&self, iid: u64) {
        assert_eq!(self.record(iid).state, ReviewState::Merged, "!{iid} not merged");
    }

    pub fn assert_not_merged(&self, iid: u64) {
        assert!(
            !self.calls().contains(&Call::Merge(iid)),
            "merge was attempted for !{iid}"
        );
    }

    /// Apply a push to the remote
    fn push(&self, branch: &str, sha: &str, lease: PushLease) -> Result<()> {
        self.log(Call::Push {
            branch: branch.to_string(),
            sha: sha.to_string(),
            lease: lease.clone(),
        });
        if self.error_on_push.lock().unwrap().contains(branch) {
            return Err(Error::Git(format!("push of {branch} rejected")));
        }

        let mut branches = self.branches.lock().unwrap();
        if let PushLease::Expect(expected) = &lease
            && branches.get(branch) != Some(expected)
        {
            return Err(Error::StalePush {
                branch: branch.to_string(),
            });
        }
        branches.insert(branch.to_string(), sha.to_string());

        for r in self.records.lock().unwrap().values_mut() {
            if r.source_branch == branch && r.state == ReviewState::Open {
                r.head_sha = Some(sha.to_string());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewService for MockReviewService {
    async fn find_reviews(&self, change_id: &ChangeId) -> Result<Vec<ReviewRecord>> {
        self.log(Call::Find(change_id.clone()));
        if let Some(msg) = self.error_on_find.lock().unwrap().as_ref() {
            return Err(Error::GitLabApi(msg.clone()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.change_id.as_ref() == Some(change_id))
            .cloned()
            .collect())
    }

    async fn list_open_reviews(&self) -> Result<Vec<ReviewRecord>> {
        self.log(Call::ListOpen);
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.state == ReviewState::Open)
            .cloned()
            .collect())
    }

    async fn get_review(&self, iid: u64) -> Result<ReviewRecord> {
        self.log(Call::Get(iid));
        let next = self
            .mergeable_queue
            .lock()
            .unwrap()
            .get_mut(&iid)
            .and_then(VecDeque::pop_front);
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&iid)
            .ok_or_else(|| Error::GitLabApi(format!("404 !{iid}")))?;
        if let Some(mergeable) = next {
            record.mergeable = mergeable;
        }
        Ok(record.clone())
    }

    async fn create_review(&self, review: &NewReview) -> Result<ReviewRecord> {
        self.log(Call::Create(review.clone()));
        if let Some(msg) = self.error_on_create.lock().unwrap().as_ref() {
            return Err(Error::GitLabApi(msg.clone()));
        }

        let iid = self.next_iid.fetch_add(1, Ordering::SeqCst);
        let record = ReviewRecord {
            iid,
            web_url: Self::web_url(iid),
            source_branch: review.source_branch.clone(),
            target_branch: review.target_branch.clone(),
            change_id: marker_change_id(&review.description, DEFAULT_TRAILER_KEY),
            state: ReviewState::Open,
            mergeable: *self.default_mergeable.lock().unwrap(),
            head_sha: self.branch_head(&review.source_branch),
            title: review.title.clone(),
            description: review.description.clone(),
        };
        self.records.lock().unwrap().insert(iid, record.clone());
        Ok(record)
    }

    async fn update_review(&self, iid: u64, update: &ReviewUpdate) -> Result<ReviewRecord> {
        self.log(Call::Update(iid, update.clone()));
        if self.error_on_update.lock().unwrap().contains(&iid) {
            return Err(Error::GitLabApi(format!("update of !{iid} rejected")));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&iid)
            .ok_or_else(|| Error::GitLabApi(format!("404 !{iid}")))?;
        if let Some(ref target) = update.target_branch {
            record.target_branch.clone_from(target);
        }
        if let Some(ref title) = update.title {
            record.title.clone_from(title);
        }
        if let Some(ref description) = update.description {
            record.description.clone_from(description);
        }
        Ok(record.clone())
    }

    async fn merge_review(&self, iid: u64) -> Result<MergeResult> {
        self.log(Call::Merge(iid));
        if let Some(msg) = self.error_on_merge.lock().unwrap().get(&iid) {
            return Err(Error::GitLabApi(msg.clone()));
        }
        if let Some(msg) = self.refuse_merge.lock().unwrap().get(&iid) {
            return Ok(MergeResult {
                merged: false,
                sha: None,
                message: Some(msg.clone()),
            });
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&iid)
            .ok_or_else(|| Error::GitLabApi(format!("404 !{iid}")))?;
        record.state = ReviewState::Merged;
        Ok(MergeResult {
            merged: true,
            sha: Some(format!("merge-{iid}")),
            message: None,
        })
    }

    async fn close_review(&self, iid: u64) -> Result<ReviewRecord> {
        self.log(Call::Close(iid));
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&iid)
            .ok_or_else(|| Error::GitLabApi(format!("404 !{iid}")))?;
        record.state = ReviewState::Closed;
        Ok(record.clone())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.log(Call::DeleteBranch(branch.to_string()));
        self.branches.lock().unwrap().remove(branch);
        Ok(())
    }

    async fn cancel_stale_pipelines(&self, iid: u64, keep_sha: &str) -> Result<usize> {
        self.log(Call::CancelPipelines(iid, keep_sha.to_string()));
        if self.error_on_cancel.lock().unwrap().contains(&iid) {
            return Err(Error::GitLabApi(format!(
                "pipelines of !{iid}: 403 Forbidden"
            )));
        }
        let mut cancelled = 0;
        for p in self.pipelines.lock().unwrap().iter_mut() {
            if p.iid == iid && p.running && p.sha != keep_sha {
                p.running = false;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }
}

/// Git stand-in whose pushes land in a `MockReviewService`
pub struct MockGit {
    remote: Arc<MockReviewService>,
    branch: String,
    commits: Mutex<Vec<RawCommit>>,
    config: Mutex<HashMap<String, String>>,
    credentials: Mutex<HashMap<String, String>>,
}

impl MockGit {
    /// Git on branch `feature` with no commits ahead
    pub fn new(remote: Arc<MockReviewService>) -> Self {
        Self {
            remote,
            branch: "feature".to_string(),
            commits: Mutex::new(Vec::new()),
            config: Mutex::new(HashMap::new()),
            credentials: Mutex::new(HashMap::new()),
        }
    }

    /// Commits `commits_between` returns, oldest first
    pub fn set_commits(&self, commits: Vec<RawCommit>) {
        *self.commits.lock().unwrap() = commits;
    }

    /// Set a git config value
    pub fn set_config(&self, key: &str, value: &str) {
        self.config
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Password the credential helper returns for a URL
    pub fn set_credential(&self, url: &str, password: &str) {
        self.credentials
            .lock()
            .unwrap()
            .insert(url.to_string(), password.to_string());
    }
}

#[async_trait]
impl GitOps for MockGit {
    async fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    async fn remote_url(&self, remote: &str) -> Result<String> {
        if remote == "origin" {
            Ok("git@gitlab.com:group/repo.git".to_string())
        } else {
            Err(Error::RemoteNotFound(remote.to_string()))
        }
    }

    async fn fetch(&self, _remote: &str) -> Result<()> {
        Ok(())
    }

    async fn ref_exists(&self, _refname: &str) -> Result<bool> {
        Ok(true)
    }

    async fn merge_base(&self, _a: &str, _b: &str) -> Result<String> {
        Ok("base".to_string())
    }

    async fn commits_between(&self, _base: &str, _tip: &str) -> Result<Vec<RawCommit>> {
        Ok(self.commits.lock().unwrap().clone())
    }

    async fn push(&self, _remote: &str, sha: &str, branch: &str, lease: PushLease) -> Result<()> {
        self.remote.push(branch, sha, lease)
    }

    async fn upstream_branch(&self, _local_branch: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn config_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.config.lock().unwrap().get(key).cloned())
    }

    async fn credential_password(&self, url: &str) -> Result<Option<String>> {
        Ok(self.credentials.lock().unwrap().get(url).cloned())
    }

    async fn toplevel(&self) -> Result<PathBuf> {
        Ok(PathBuf::from("/tmp/repo"))
    }
}
