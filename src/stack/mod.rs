//! Local commit stack
//!
//! Identifier extraction and the ordered commit walk that feed the chain
//! reconciler.

mod builder;
pub mod trailer;

pub use builder::{build_commit_stack, describe_commits};
pub use trailer::{DEFAULT_TRAILER_KEY, TrailerError, parse_change_id, split_message};
