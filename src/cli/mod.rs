//! CLI commands
//!
//! Command implementations for the `mr-chain` binary.

mod auth;
mod context;
mod progress;
mod style;
mod sync;

pub use auth::{run_auth_setup, run_auth_test};
pub use progress::CliProgress;
pub use sync::{SyncOptions, run_sync};
