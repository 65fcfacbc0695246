//! Cleanup command - remove unreachable registry artifacts
//!
//! Syncs the repository mirror, enumerates owned artifacts, scans commit
//! history from the retained references, and deletes every artifact whose
//! source commit no reference can reach. Artifacts without a usable commit
//! label are kept and reported.

use crate::cli::args::CleanupArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{StagekeepError, StagekeepResult};
use crate::gitcache::RemoteGitRepo;
use crate::lock::HostLocker;
use crate::registry::{ArtifactInfo, HttpRegistryClient, ImagesRepo, RepoLayout};
use crate::scan::{scan_references_history, select_references, RetentionPolicy, ScanSummary};
use crate::ui::{self, TaskSpinner, UiContext};
use chrono::Utc;
use git2::Oid;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::time::Duration;

/// Delete/keep split for the enumerated artifacts
#[derive(Debug, Default)]
struct CleanupPlan {
    /// Artifacts whose commit was reached; kept
    keep: Vec<ArtifactInfo>,
    /// Artifacts whose commit no reference reaches; delete candidates
    delete: Vec<ArtifactInfo>,
    /// Artifacts with a missing or unparsable commit label; kept
    unclassified: Vec<ArtifactInfo>,
}

/// Execute the cleanup command
pub async fn execute(args: CleanupArgs, config: &Config) -> StagekeepResult<()> {
    validate(config)?;

    let ctx = UiContext::detect().with_auto_yes(args.yes);
    ui::intro(&ctx, "Registry cleanup");

    let locker = HostLocker::new(ConfigManager::locks_dir())?;
    let lock_timeout = Duration::from_secs(config.lock.timeout_secs);

    let repo = RemoteGitRepo::open(
        &config.project.name,
        &config.git.url,
        ConfigManager::git_repos_dir(),
        ConfigManager::worktrees_dir(),
        locker,
        lock_timeout,
    )?;

    // Phase 1: bring the mirror up to date and collect scan references.
    // git2 calls block, so the whole git phase runs off the async threads.
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Syncing repository mirror...");
    let upstream = config.git.upstream.clone();
    let git_result = tokio::task::spawn_blocking(move || -> StagekeepResult<_> {
        repo.sync()?;
        let refs = repo.scan_references(&upstream)?;
        Ok((repo, refs))
    })
    .await
    .map_err(|e| StagekeepError::User(format!("Git task failed: {e}")))?;
    let (repo, references) = match git_result {
        Ok(synced) => synced,
        Err(e) => {
            spinner.stop_error("Repository sync failed");
            return Err(e);
        }
    };
    spinner.stop(&format!(
        "Repository synced, {} reference(s) found",
        references.len()
    ));

    let policy = RetentionPolicy {
        period_days: config.retention.period_days,
        branch_limit: config.retention.branch_limit,
        tag_limit: config.retention.tag_limit,
    };
    let references = select_references(references, &policy, Utc::now());

    // Phase 2: enumerate owned artifacts
    spinner.start("Enumerating registry artifacts...");
    let client = HttpRegistryClient::new(&config.registry)?;
    let images_repo = ImagesRepo::new(
        client,
        config.registry.address.clone(),
        RepoLayout::resolve(config.registry.mode),
    );
    let selected = match images_repo
        .select_artifacts(&config.project.images, None)
        .await
    {
        Ok(selected) => selected,
        Err(e) => {
            spinner.stop_error("Registry enumeration failed");
            return Err(e);
        }
    };
    let total: usize = selected.values().map(Vec::len).sum();
    spinner.stop(&format!("Found {} owned artifact(s)", total));

    // Phase 3: prove reachability of the artifact commits
    let expected: HashSet<Oid> = selected
        .values()
        .flatten()
        .filter_map(ArtifactInfo::source_commit)
        .collect();

    spinner.start("Scanning commit history...");
    let scan_result = tokio::task::spawn_blocking(move || -> StagekeepResult<_> {
        let graph = repo.commit_graph()?;
        scan_references_history(&graph, &references, expected)
    })
    .await
    .map_err(|e| StagekeepError::User(format!("Scan task failed: {e}")))?;
    let summary = match scan_result {
        Ok(summary) => summary,
        Err(e) => {
            spinner.stop_error("History scan failed");
            return Err(e);
        }
    };
    spinner.stop(&format!(
        "Scan complete, {} commit(s) reachable",
        summary.reached.len()
    ));

    let plan = classify(&selected, &summary);

    ui::note(&ctx, "Cleanup plan", &describe(&plan, &selected));
    for artifact in &plan.unclassified {
        ui::step_warn(
            &ctx,
            &format!(
                "Artifact {} has no usable commit label, keeping it",
                artifact.reference()
            ),
        );
    }

    if plan.delete.is_empty() {
        ui::outro_success(&ctx, "Nothing to delete");
        return Ok(());
    }

    if args.dry_run {
        ui::outro_success(
            &ctx,
            &format!("Dry run: {} artifact(s) would be deleted", plan.delete.len()),
        );
        return Ok(());
    }

    if !ui::confirm(
        &ctx,
        &format!("Delete {} artifact(s)?", plan.delete.len()),
        false,
    )
    .await?
    {
        ui::outro_warn(&ctx, "Cleanup aborted");
        return Ok(());
    }

    // Per-artifact failures are reported, not fatal
    let bar = if ctx.is_interactive() {
        let bar = ProgressBar::new(plan.delete.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.cyan} Deleting {bar:20.cyan/dim} {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    let mut failed = 0usize;
    for artifact in &plan.delete {
        if let Err(e) = images_repo.delete_artifact(artifact).await {
            ui::step_warn(
                &ctx,
                &format!("Failed to delete {}: {}", artifact.reference(), e),
            );
            failed += 1;
        }
        if let Some(ref bar) = bar {
            bar.inc(1);
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let deleted = plan.delete.len() - failed;
    if failed == 0 {
        ui::outro_success(&ctx, &format!("Deleted {} artifact(s)", deleted));
    } else {
        ui::outro_warn(
            &ctx,
            &format!("Deleted {} artifact(s), {} failed", deleted, failed),
        );
    }
    Ok(())
}

fn validate(config: &Config) -> StagekeepResult<()> {
    if config.git.url.is_empty() {
        return Err(StagekeepError::User(
            "git.url is not configured".to_string(),
        ));
    }
    if config.registry.endpoint.is_empty() || config.registry.address.is_empty() {
        return Err(StagekeepError::User(
            "registry.endpoint and registry.address must be configured".to_string(),
        ));
    }
    if config.project.images.is_empty() {
        return Err(StagekeepError::User(
            "project.images is empty, nothing to clean".to_string(),
        ));
    }
    Ok(())
}

fn classify(
    selected: &HashMap<String, Vec<ArtifactInfo>>,
    summary: &ScanSummary,
) -> CleanupPlan {
    let mut plan = CleanupPlan::default();
    for artifact in selected.values().flatten() {
        match artifact.source_commit() {
            Some(commit) if summary.is_reached(commit) => plan.keep.push(artifact.clone()),
            Some(_) => plan.delete.push(artifact.clone()),
            None => plan.unclassified.push(artifact.clone()),
        }
    }
    plan
}

fn describe(plan: &CleanupPlan, selected: &HashMap<String, Vec<ArtifactInfo>>) -> String {
    let mut body = String::new();
    let mut images: Vec<_> = selected.keys().collect();
    images.sort();
    for image in images {
        let _ = writeln!(body, "{}: {} artifact(s)", image, selected[image].len());
    }
    let _ = writeln!(
        body,
        "keep {}, delete {}, unclassified {}",
        plan.keep.len() + plan.unclassified.len(),
        plan.delete.len(),
        plan.unclassified.len()
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::labels;

    fn artifact(tag: &str, commit: Option<&str>) -> ArtifactInfo {
        let mut labels_map = HashMap::new();
        labels_map.insert(labels::OWNED.to_string(), "true".to_string());
        if let Some(commit) = commit {
            labels_map.insert(labels::COMMIT.to_string(), commit.to_string());
        }
        ArtifactInfo {
            repository: "reg.example.com/acme/web".to_string(),
            tag: tag.to_string(),
            labels: labels_map,
        }
    }

    fn oid(n: u8) -> Oid {
        Oid::from_str(&format!("{n:040x}")).unwrap()
    }

    #[test]
    fn classify_splits_by_reachability() {
        let mut selected = HashMap::new();
        selected.insert(
            "web".to_string(),
            vec![
                artifact("reached", Some(&oid(1).to_string())),
                artifact("orphaned", Some(&oid(2).to_string())),
                artifact("no-label", None),
                artifact("bad-label", Some("zzz")),
            ],
        );

        let summary = ScanSummary {
            reached: vec![oid(1)],
            stop_commits: HashSet::new(),
            unreached: HashSet::new(),
        };
        let plan = classify(&selected, &summary);

        assert_eq!(plan.keep.len(), 1);
        assert_eq!(plan.keep[0].tag, "reached");
        assert_eq!(plan.delete.len(), 1);
        assert_eq!(plan.delete[0].tag, "orphaned");
        assert_eq!(plan.unclassified.len(), 2);
    }

    #[test]
    fn validate_requires_core_settings() {
        let mut config = Config::default();
        assert!(validate(&config).is_err());

        config.git.url = "https://git.example.com/acme/shop.git".to_string();
        config.registry.endpoint = "https://reg.example.com".to_string();
        config.registry.address = "reg.example.com/acme/shop".to_string();
        assert!(validate(&config).is_err()); // no images yet

        config.project.images = vec!["web".to_string()];
        assert!(validate(&config).is_ok());
    }
}
