//! Host-cleanup command - sweep build leftovers from this host

use crate::cli::args::HostCleanupArgs;
use crate::config::{Config, ConfigManager};
use crate::error::StagekeepResult;
use crate::lock::HostLocker;
use crate::runtime::PodmanRuntime;
use crate::sweep::{HostSweeper, SweepReport};
use crate::ui::{self, UiContext};
use std::fmt::Write as _;
use std::time::Duration;

/// Execute the host-cleanup command
pub async fn execute(args: HostCleanupArgs, config: &Config) -> StagekeepResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Host cleanup");

    let locker = HostLocker::new(ConfigManager::locks_dir())?;
    let runtime = PodmanRuntime::new();
    let sweeper = HostSweeper::new(
        &locker,
        &runtime,
        ConfigManager::tmp_dir(),
        ConfigManager::worktrees_root(),
        Duration::from_secs(config.lock.timeout_secs),
        args.dry_run,
    );

    let report = sweeper.run().await?;

    if report.is_empty() {
        ui::outro_success(&ctx, "Nothing to clean");
        return Ok(());
    }

    ui::note(&ctx, "Sweep report", &describe(&report));
    for failure in &report.failures {
        ui::step_warn(&ctx, &format!("Failed to remove {}: {}", failure.id, failure.reason));
    }

    let verb = if args.dry_run { "would be removed" } else { "removed" };
    let total = report.removed_containers.len()
        + report.removed_images.len()
        + report.removed_tmp_entries.len();
    if report.failures.is_empty() {
        ui::outro_success(&ctx, &format!("{} item(s) {}", total, verb));
    } else {
        ui::outro_warn(
            &ctx,
            &format!("{} item(s) {}, {} failed", total, verb, report.failures.len()),
        );
    }
    Ok(())
}

fn describe(report: &SweepReport) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "containers: {}", report.removed_containers.len());
    let _ = writeln!(body, "images: {}", report.removed_images.len());
    let _ = writeln!(body, "temp entries: {}", report.removed_tmp_entries.len());
    if !report.skipped.is_empty() {
        let _ = writeln!(body, "skipped: {}", report.skipped.len());
        for item in &report.skipped {
            let _ = writeln!(body, "  {} ({})", item.subject, item.reason);
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RemovalFailure;
    use crate::sweep::SkippedItem;

    #[test]
    fn describe_lists_counts_and_skips() {
        let report = SweepReport {
            removed_containers: vec!["a".to_string()],
            removed_images: vec![],
            removed_tmp_entries: vec![],
            skipped: vec![SkippedItem {
                subject: "busy".to_string(),
                reason: "locked by another process".to_string(),
            }],
            failures: vec![RemovalFailure {
                id: "x".to_string(),
                reason: "boom".to_string(),
            }],
        };

        let body = describe(&report);
        assert!(body.contains("containers: 1"));
        assert!(body.contains("busy (locked by another process)"));
    }
}
