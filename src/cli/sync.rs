//! Sync command - sync the branch's commit stack as a merge request chain

use crate::cli::CliProgress;
use crate::cli::context::CommandContext;
use crate::cli::style::{CHECK, Stylize, arrow, check, cross, spinner_style};
use anstream::{eprintln, print, println};
use dialoguer::Confirm;
use indicatif::ProgressBar;
use mr_chain::chain::{
    ChainPlan, Phase, ProgressCallback, SyncReport, execute_chain, plan_chain, read_remote_chain,
};
use mr_chain::config::{ConfigOverrides, OrphanPolicy};
use mr_chain::error::{Error, Result};
use mr_chain::git::GitOps;
use mr_chain::merge::{EntryState, MergeReport, execute_merge};
use mr_chain::stack::build_commit_stack;
use std::path::Path;
use std::time::Duration;

/// Options for the sync command
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Local branch (defaults to the current branch)
    pub branch: Option<String>,
    /// Merge the chain after syncing
    pub merge: bool,
    /// Show the plan only
    pub dry_run: bool,
    /// Prompt before writing
    pub confirm: bool,
    /// Command-line config overrides
    pub overrides: ConfigOverrides,
}

/// Run the sync command
///
/// Returns `false` when the chain could not be fully synced or merged.
#[allow(clippy::too_many_lines)]
pub async fn run_sync(path: &Path, remote: &str, options: SyncOptions) -> Result<bool> {
    let ctx = CommandContext::new(path, remote, options.branch.as_deref(), &options.overrides)
        .await?;
    let config = &ctx.config;
    let progress = CliProgress;

    // Fetch from remote with spinner
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Fetching from {}...", config.remote.emphasis()));
    spinner.enable_steady_tick(Duration::from_millis(80));
    ctx.git.fetch(&config.remote).await?;
    spinner.finish_with_message(format!("{} Fetched from {}", check(), config.remote.emphasis()));

    progress.on_phase(Phase::Analyzing).await;
    let commits = build_commit_stack(
        &ctx.git,
        &config.local_branch,
        &config.target_ref(),
        &config.trailer_key,
    )
    .await?;

    progress.on_phase(Phase::Reading).await;
    let remote_chain = read_remote_chain(ctx.service.as_ref(), &commits, config).await?;

    progress.on_phase(Phase::Planning).await;
    let plan = plan_chain(&commits, &remote_chain, config)?;

    print_plan(&plan, config.orphan_policy);

    if options.dry_run {
        println!("{}", "Dry run, nothing changed".muted());
        return Ok(true);
    }

    let orphans_to_close = config.orphan_policy == OrphanPolicy::Close && !plan.orphans.is_empty();
    if plan.is_noop() && !orphans_to_close && !options.merge {
        println!("{} {}", check(), "Already in sync".success());
        return Ok(true);
    }

    if options.confirm {
        let prompt = if options.merge {
            "Proceed with sync and merge?"
        } else {
            "Proceed with sync?"
        };
        if !Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?
        {
            println!("{}", "Aborted".muted());
            return Ok(true);
        }
        println!();
    }

    let report = execute_chain(
        &plan,
        &ctx.git,
        ctx.service.as_ref(),
        config,
        &progress,
    )
    .await?;
    print_sync_summary(&report);

    if !report.is_success() {
        return Ok(false);
    }
    if !options.merge {
        return Ok(true);
    }

    println!();
    let merge_report = execute_merge(&report.entries, ctx.service.as_ref(), config, &progress).await;
    print_merge_summary(&merge_report);
    Ok(merge_report.is_success())
}

/// Print the chain plan
fn print_plan(plan: &ChainPlan, policy: OrphanPolicy) {
    println!(
        "{} {}",
        "Chain onto".emphasis(),
        plan.root_target.accent()
    );
    for entry in &plan.entries {
        println!("  {} {}", arrow(), entry);
    }

    for orphan in &plan.orphans {
        let what = match policy {
            OrphanPolicy::Leave => "orphaned, will be left open",
            OrphanPolicy::Close => "orphaned, will be closed",
        };
        println!(
            "  {} !{} {} ({what})",
            arrow(),
            orphan.iid,
            orphan.source_branch.warn().for_stdout()
        );
    }
    println!();
}

fn print_sync_summary(report: &SyncReport) {
    println!();
    if let Some(ref failure) = report.failure {
        eprintln!(
            "{} Sync stopped at position {} ({}): {}",
            cross(),
            failure.position,
            failure.change_id,
            failure.error.to_string().error()
        );
        eprintln!(
            "{}",
            "Entries before it are synced; re-run to continue.".muted()
        );
        return;
    }

    println!(
        "{} {} created, {} updated, {} retargeted, {} unchanged",
        format!("{CHECK} Sync complete:").success(),
        report.created().count().accent(),
        report.updated().count().accent(),
        report.retargeted().count().accent(),
        report.unchanged().count().accent()
    );
    if report.pipelines_cancelled > 0 {
        println!(
            "  {}",
            format!("{} stale pipeline(s) cancelled", report.pipelines_cancelled).muted()
        );
    }
    if !report.orphans_closed.is_empty() {
        println!(
            "  {}",
            format!("{} orphaned merge request(s) closed", report.orphans_closed.len()).muted()
        );
    }
}

fn print_merge_summary(report: &MergeReport) {
    println!();
    for outcome in &report.outcomes {
        let state = outcome.state.to_string();
        let state = match outcome.state {
            EntryState::Merged => state.success().to_string(),
            EntryState::Blocked => state.warn().for_stdout().to_string(),
            EntryState::Failed => state.error().for_stdout().to_string(),
            EntryState::Pending => state.muted().to_string(),
        };
        print!("  !{} {} {state}", outcome.iid, outcome.source_branch.accent());
        match outcome.reason {
            Some(ref reason) => println!(" {}", format!("({reason})").muted()),
            None => println!(),
        }
    }

    match report.first_stop() {
        None => println!(
            "{} {}",
            format!("{CHECK} Merged").success(),
            format!("{} merge request(s)", report.merged().count()).accent()
        ),
        Some(stop) => eprintln!(
            "{} Merge stopped at !{}; {} merged",
            cross(),
            stop.iid,
            report.merged().count()
        ),
    }
}
