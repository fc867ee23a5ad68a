//! GitLab review service implementation

use crate::error::{Error, Result};
use crate::platform::ReviewService;
use crate::stack::trailer::marker_change_id;
use crate::types::{
    ChangeId, MergeResult, Mergeable, NewReview, ProjectConfig, ReviewRecord, ReviewState,
    ReviewUpdate,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// GitLab service using reqwest
pub struct GitLabService {
    client: Client,
    token: String,
    project: ProjectConfig,
    trailer_key: String,
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    web_url: String,
    source_branch: String,
    target_branch: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    state: String, // "opened", "closed", "merged", "locked"
    #[serde(default)]
    detailed_merge_status: Option<String>,
    #[serde(default)]
    merge_status: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

/// Merge response
#[derive(Deserialize)]
struct MergeResponse {
    state: String,
    #[serde(default)]
    merge_commit_sha: Option<String>,
    #[serde(default)]
    squash_commit_sha: Option<String>,
}

/// Pipeline list entry
#[derive(Deserialize)]
struct Pipeline {
    id: u64,
    sha: String,
    status: String, // "running", "pending", "success", "failed", ...
}

#[derive(Serialize)]
struct CreateMrPayload<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
    remove_source_branch: bool,
}

#[derive(Serialize)]
struct UpdateMrPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    target_branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size for list endpoints
const PER_PAGE: &str = "100";

/// Interpret GitLab's merge status fields
///
/// `detailed_merge_status` (GitLab 15.6+) wins; the legacy `merge_status`
/// is used when it is absent.
pub fn mergeable_from_status(detailed: Option<&str>, legacy: Option<&str>) -> Mergeable {
    match detailed {
        Some("mergeable") => Mergeable::Yes,
        Some("checking" | "unchecked" | "preparing" | "approvals_syncing") => Mergeable::Unknown,
        Some(_) => Mergeable::No,
        None => match legacy {
            Some("can_be_merged") => Mergeable::Yes,
            Some("cannot_be_merged" | "cannot_be_merged_rechecking") => Mergeable::No,
            _ => Mergeable::Unknown,
        },
    }
}

fn review_state(state: &str) -> ReviewState {
    match state {
        "opened" => ReviewState::Open,
        "merged" => ReviewState::Merged,
        _ => ReviewState::Closed,
    }
}

impl GitLabService {
    /// Create a new GitLab service
    pub fn new(token: String, project: ProjectConfig, trailer_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::GitLabApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            project,
            trailer_key: trailer_key.into(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v4/projects/{}{}",
            self.project.host.trim_end_matches('/'),
            urlencoding::encode(&self.project.project_path),
            path
        )
    }

    fn record(&self, mr: MergeRequest) -> ReviewRecord {
        let description = mr.description.unwrap_or_default();
        ReviewRecord {
            iid: mr.iid,
            web_url: mr.web_url,
            source_branch: mr.source_branch,
            target_branch: mr.target_branch,
            change_id: marker_change_id(&description, &self.trailer_key),
            state: review_state(&mr.state),
            mergeable: mergeable_from_status(
                mr.detailed_merge_status.as_deref(),
                mr.merge_status.as_deref(),
            ),
            head_sha: mr.sha,
            title: mr.title,
            description,
        }
    }

    /// Turn a non-success response into an error carrying the body
    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::GitLabApi(format!("{what} failed ({status}): {}", body.trim())))
    }

    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = self.api_url(path);
        let mut results = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_str = page.to_string();
            let response = self
                .client
                .get(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page_str.as_str())])
                .send()
                .await?;
            let response = Self::check(response, "listing").await?;

            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u32>().ok());

            let items: Vec<T> = response.json().await?;
            let empty = items.is_empty();
            results.extend(items);

            match next_page {
                Some(next) if !empty && next > page => page = next,
                _ => break,
            }
        }

        Ok(results)
    }

    async fn send_mr(&self, request: reqwest::RequestBuilder, what: &str) -> Result<ReviewRecord> {
        let response = request.header("PRIVATE-TOKEN", &self.token).send().await?;
        let mr: MergeRequest = Self::check(response, what).await?.json().await?;
        Ok(self.record(mr))
    }
}

#[async_trait]
impl ReviewService for GitLabService {
    async fn find_reviews(&self, change_id: &ChangeId) -> Result<Vec<ReviewRecord>> {
        debug!(%change_id, "finding MRs by change id");
        let mrs: Vec<MergeRequest> = self
            .get_paginated(
                "/merge_requests",
                &[
                    ("state", "all"),
                    ("in", "description"),
                    ("search", change_id.as_str()),
                ],
            )
            .await?;

        // The search is fuzzy; keep only exact marker matches.
        let records: Vec<ReviewRecord> = mrs
            .into_iter()
            .map(|mr| self.record(mr))
            .filter(|r| r.change_id.as_ref() == Some(change_id))
            .collect();
        debug!(%change_id, count = records.len(), "found MRs");
        Ok(records)
    }

    async fn list_open_reviews(&self) -> Result<Vec<ReviewRecord>> {
        debug!("listing open MRs");
        let mrs: Vec<MergeRequest> = self
            .get_paginated(
                "/merge_requests",
                &[("state", "opened"), ("scope", "created_by_me")],
            )
            .await?;
        Ok(mrs.into_iter().map(|mr| self.record(mr)).collect())
    }

    async fn get_review(&self, iid: u64) -> Result<ReviewRecord> {
        debug!(mr_iid = iid, "getting MR");
        let url = self.api_url(&format!("/merge_requests/{iid}"));
        self.send_mr(self.client.get(&url), "getting MR").await
    }

    async fn create_review(&self, review: &NewReview) -> Result<ReviewRecord> {
        debug!(
            source = %review.source_branch,
            target = %review.target_branch,
            "creating MR"
        );
        let url = self.api_url("/merge_requests");
        let payload = CreateMrPayload {
            source_branch: &review.source_branch,
            target_branch: &review.target_branch,
            title: &review.title,
            description: &review.description,
            remove_source_branch: review.remove_source_branch,
        };

        let record = self
            .send_mr(self.client.post(&url).json(&payload), "creating MR")
            .await?;
        debug!(mr_iid = record.iid, "created MR");
        Ok(record)
    }

    async fn update_review(&self, iid: u64, update: &ReviewUpdate) -> Result<ReviewRecord> {
        debug!(mr_iid = iid, ?update, "updating MR");
        let url = self.api_url(&format!("/merge_requests/{iid}"));
        let payload = UpdateMrPayload {
            target_branch: update.target_branch.as_deref(),
            title: update.title.as_deref(),
            description: update.description.as_deref(),
        };
        self.send_mr(self.client.put(&url).json(&payload), "updating MR")
            .await
    }

    async fn merge_review(&self, iid: u64) -> Result<MergeResult> {
        debug!(mr_iid = iid, "merging MR");
        let url = self.api_url(&format!("/merge_requests/{iid}/merge"));

        // The orchestrator deletes the branch itself once dependents are
        // retargeted.
        let response = self
            .client
            .put(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&serde_json::json!({ "should_remove_source_branch": false }))
            .send()
            .await?;

        // 405/406/409/422 are GitLab's "cannot merge right now" answers.
        let status = response.status();
        if matches!(
            status,
            StatusCode::METHOD_NOT_ALLOWED
                | StatusCode::NOT_ACCEPTABLE
                | StatusCode::CONFLICT
                | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            let body = response.text().await.unwrap_or_default();
            debug!(mr_iid = iid, %status, "merge refused");
            return Ok(MergeResult {
                merged: false,
                sha: None,
                message: Some(format!("{status}: {}", body.trim())),
            });
        }

        let response: MergeResponse = Self::check(response, "merging MR").await?.json().await?;
        let merge_result = MergeResult {
            merged: response.state == "merged",
            sha: response.squash_commit_sha.or(response.merge_commit_sha),
            message: None,
        };

        debug!(
            mr_iid = iid,
            merged = merge_result.merged,
            sha = ?merge_result.sha,
            "merge complete"
        );
        Ok(merge_result)
    }

    async fn close_review(&self, iid: u64) -> Result<ReviewRecord> {
        debug!(mr_iid = iid, "closing MR");
        let url = self.api_url(&format!("/merge_requests/{iid}"));
        self.send_mr(
            self.client
                .put(&url)
                .json(&serde_json::json!({ "state_event": "close" })),
            "closing MR",
        )
        .await
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "deleting branch");
        let url = self.api_url(&format!(
            "/repository/branches/{}",
            urlencoding::encode(branch)
        ));

        let response = self
            .client
            .delete(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(branch, "branch already gone");
            return Ok(());
        }
        Self::check(response, "deleting branch").await?;
        Ok(())
    }

    async fn cancel_stale_pipelines(&self, iid: u64, keep_sha: &str) -> Result<usize> {
        let pipelines: Vec<Pipeline> = self
            .get_paginated(&format!("/merge_requests/{iid}/pipelines"), &[])
            .await?;

        let mut cancelled = 0;
        for pipeline in pipelines
            .iter()
            .filter(|p| p.sha != keep_sha && matches!(p.status.as_str(), "running" | "pending"))
        {
            let url = self.api_url(&format!("/pipelines/{}/cancel", pipeline.id));
            let response = self
                .client
                .post(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .send()
                .await?;
            Self::check(response, "cancelling pipeline").await?;
            cancelled += 1;
        }

        debug!(mr_iid = iid, cancelled, "cancelled stale pipelines");
        Ok(cancelled)
    }
}
