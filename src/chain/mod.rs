//! Chain engine
//!
//! Three-phase pattern:
//! 1. Read - find the open merge request of every local identifier (effectful)
//! 2. Plan - reconcile local commits with remote records (pure, testable)
//! 3. Execute - push branches and write merge requests root to tip (effectful)

mod execute;
mod plan;
mod progress;
mod reader;

pub use execute::{SyncFailure, SyncReport, SyncedEntry, execute_chain};
pub use plan::{ChainAction, ChainEntry, ChainPlan, plan_chain};
pub use progress::{NoopProgress, Phase, ProgressCallback, PushStatus};
pub use reader::{RemoteChain, read_remote_chain, select_record};
