//! CLI progress callback with styled output

use crate::cli::style::{Stream, Stylize, check, cross, hyperlink_url};
use anstream::{eprintln, print, println};
use async_trait::async_trait;
use mr_chain::chain::{Phase, ProgressCallback, PushStatus};
use mr_chain::error::Error;
use mr_chain::types::ReviewRecord;
use std::io::Write;

/// CLI progress callback printing indented, styled lines
pub struct CliProgress;

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_phase(&self, phase: Phase) {
        let label = match phase {
            Phase::Syncing => "Syncing chain",
            Phase::Merging => "Merging chain",
            _ => return,
        };
        println!("{}", format!("{label}...").emphasis());
    }

    async fn on_branch_push(&self, branch: &str, status: PushStatus) {
        match status {
            PushStatus::Started => {
                print!("  Pushing {}... ", branch.accent());
                let _ = std::io::stdout().flush();
            }
            PushStatus::Success => println!("{}", "done".success()),
            PushStatus::Failed(msg) => println!("{}", msg.warn().for_stdout()),
        }
    }

    async fn on_review_created(&self, record: &ReviewRecord) {
        println!(
            "  {} Created {} {} ({})",
            check(),
            format!("!{}", record.iid).accent(),
            record.title,
            hyperlink_url(Stream::Stdout, &record.web_url)
        );
    }

    async fn on_review_updated(&self, record: &ReviewRecord) {
        println!(
            "  {} Updated {} {} {}",
            check(),
            format!("!{}", record.iid).accent(),
            "->".muted(),
            record.target_branch.accent()
        );
    }

    async fn on_review_merged(&self, record: &ReviewRecord) {
        println!(
            "  {} Merged {} {}",
            check(),
            format!("!{}", record.iid).accent(),
            record.title
        );
    }

    async fn on_error(&self, err: &Error) {
        eprintln!("  {} {}: {}", cross(), "error".error(), err);
    }

    async fn on_message(&self, message: &str) {
        println!("  {}", message.muted());
    }
}
