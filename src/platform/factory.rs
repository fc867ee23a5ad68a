//! Review service factory

use crate::auth::get_gitlab_auth;
use crate::error::Result;
use crate::git::GitOps;
use crate::platform::{GitLabService, ReviewService};
use crate::types::ProjectConfig;

/// Create a review service for `project`
///
/// Resolves the token and builds the GitLab client.
pub async fn create_review_service(
    git: &dyn GitOps,
    project: &ProjectConfig,
    trailer_key: &str,
) -> Result<Box<dyn ReviewService>> {
    let auth = get_gitlab_auth(git, &project.host).await?;
    Ok(Box::new(GitLabService::new(
        auth.token,
        project.clone(),
        trailer_key,
    )?))
}
