//! Merge orchestrator for a synchronized chain
//!
//! Two parts, matching the chain engine:
//! 1. State - per-entry state machine and report (pure, testable)
//! 2. Execute - the ordered merge walk (effectful)

mod execute;
mod state;

pub use execute::execute_merge;
pub use state::{EntryOutcome, EntryState, MergeDecision, MergeReport, decide};
