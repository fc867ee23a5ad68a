//! Commit stack builder
//!
//! Walks the commits between the merge base with the root target and the
//! branch tip, and turns them into ordered [`CommitDescriptor`]s.

use crate::error::{Error, Result};
use crate::git::GitOps;
use crate::stack::trailer::{TrailerError, parse_change_id};
use crate::types::{ChangeId, CommitDescriptor, RawCommit};
use std::collections::HashMap;
use tracing::debug;

/// Build the ordered commit stack for `branch` against `target_ref`
///
/// `target_ref` is normally the remote-tracking ref of the root target,
/// e.g. `origin/main`.
pub async fn build_commit_stack(
    git: &dyn GitOps,
    branch: &str,
    target_ref: &str,
    trailer_key: &str,
) -> Result<Vec<CommitDescriptor>> {
    if !git.ref_exists(target_ref).await? {
        return Err(Error::Config(format!(
            "target ref {target_ref} does not exist; fetch the remote or set target_branch"
        )));
    }

    let base = git.merge_base(target_ref, branch).await?;
    debug!(branch, target_ref, %base, "computed merge base");

    let raw = git.commits_between(&base, branch).await?;
    if raw.is_empty() {
        return Err(Error::NoCommitsAhead {
            branch: branch.to_string(),
            target: target_ref.to_string(),
        });
    }

    let stack = describe_commits(&raw, trailer_key)?;
    debug!(count = stack.len(), "built commit stack");
    Ok(stack)
}

/// Turn raw commits (oldest first) into descriptors
///
/// Every commit is checked before returning, so a stack with a missing or
/// duplicated identifier never reaches the remote.
pub fn describe_commits(raw: &[RawCommit], trailer_key: &str) -> Result<Vec<CommitDescriptor>> {
    let mut seen: HashMap<ChangeId, &str> = HashMap::new();
    let mut stack = Vec::with_capacity(raw.len());

    for (position, commit) in raw.iter().enumerate() {
        if commit.parents.len() > 1 {
            return Err(Error::NonLinearStack {
                sha: commit.sha.clone(),
            });
        }

        let subject = commit.message.lines().next().unwrap_or_default().to_string();
        let change_id = match parse_change_id(&commit.message, trailer_key) {
            Ok(id) => id,
            Err(TrailerError::Missing(_) | TrailerError::Empty(_)) => {
                return Err(Error::MissingIdentifier {
                    sha: commit.sha.clone(),
                    subject,
                });
            }
            Err(e @ TrailerError::Conflicting { .. }) => {
                return Err(Error::Parse(format!("commit {}: {e}", commit.sha)));
            }
        };

        if let Some(first) = seen.get(&change_id) {
            return Err(Error::DuplicateIdentifier {
                change_id: change_id.to_string(),
                first: (*first).to_string(),
                second: commit.sha.clone(),
            });
        }
        seen.insert(change_id.clone(), &commit.sha);

        stack.push(CommitDescriptor {
            sha: commit.sha.clone(),
            subject,
            message: commit.message.clone(),
            change_id,
            position,
        });
    }

    Ok(stack)
}
