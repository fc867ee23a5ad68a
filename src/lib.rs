//! mr-chain - stacked GitLab merge requests from a linear git branch
//!
//! Every commit between the root target and the branch tip becomes one merge
//! request. Request `i` targets the source branch of request `i - 1`, so each
//! one shows only its own commit. Commits are matched to merge requests by the
//! `Change-Id` trailer, which survives amend and rebase.
//!
//! The engine runs in four steps:
//! - [`stack::build_commit_stack`] reads the local commits
//! - [`chain::read_remote_chain`] finds their merge requests
//! - [`chain::plan_chain`] decides what to do (pure)
//! - [`chain::execute_chain`] and [`merge::execute_merge`] do it

pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod git;
pub mod merge;
pub mod platform;
pub mod stack;
pub mod types;
