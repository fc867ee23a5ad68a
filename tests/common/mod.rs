//! Shared test utilities

#![allow(dead_code)]

mod mock_platform;
mod temp_repo;

pub use mock_platform::{Call, MockGit, MockReviewService};
pub use temp_repo::TempGitRepo;

use mr_chain::config::ChainConfig;
use mr_chain::types::RawCommit;
use std::time::Duration;

/// Raw commit with a Change-Id trailer and a single parent
pub fn raw_commit(sha: &str, subject: &str, change_id: &str) -> RawCommit {
    RawCommit {
        sha: sha.to_string(),
        message: format!("{subject}\n\nBody of {subject}.\n\nChange-Id: {change_id}"),
        parents: vec![format!("parent-of-{sha}")],
    }
}

/// Config for branch `feature` onto `main` with no polling delay
pub fn test_config() -> ChainConfig {
    let mut config = ChainConfig::new("origin", "feature", "main");
    config.merge_poll_interval = Duration::ZERO;
    config
}
