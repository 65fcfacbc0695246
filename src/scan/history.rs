//! Reference history scanning
//!
//! Walks the commit graph from each reference tip, claiming commits out of
//! the expected set. Claims are one-shot: once a reference claims a commit,
//! no later reference can re-claim it. Stop commits accumulated by earlier
//! references bound the descent of later ones, so shared ancestry is walked
//! once per scan instead of once per reference.
//!
//! A scan is all-or-nothing: any failure reading a commit aborts it, since
//! partial reachability results are unsafe to base deletions on.

use crate::error::StagekeepResult;
use crate::scan::{CommitGraph, ScanReference};
use git2::Oid;
use std::collections::HashSet;
use tracing::debug;

/// Traversal state threaded through one full scan. Owned by the driver and
/// lent to each per-reference walk; the expected set shrinks destructively
/// as commits are claimed, the stop set only grows.
#[derive(Debug)]
pub struct ScanContext {
    expected: HashSet<Oid>,
    stop: HashSet<Oid>,
}

impl ScanContext {
    /// Start a scan looking for the given candidate commits
    pub fn new(expected: HashSet<Oid>) -> Self {
        Self {
            expected,
            stop: HashSet::new(),
        }
    }

    /// Candidates no reference has claimed yet
    pub fn remaining_expected(&self) -> &HashSet<Oid> {
        &self.expected
    }

    /// Stop commits accumulated so far
    pub fn stop_commits(&self) -> &HashSet<Oid> {
        &self.stop
    }
}

/// Result of one full multi-reference scan
#[derive(Debug)]
pub struct ScanSummary {
    /// Commits proven reachable, first-seen order across references
    pub reached: Vec<Oid>,
    /// Accumulated stop commits
    pub stop_commits: HashSet<Oid>,
    /// Expected commits no reference reached
    pub unreached: HashSet<Oid>,
}

impl ScanSummary {
    /// Whether the given commit was proven reachable
    pub fn is_reached(&self, commit: Oid) -> bool {
        self.reached.contains(&commit)
    }
}

/// Walk one reference's history, claiming expected commits.
///
/// Descent halts at stop commits (without visiting them), when the
/// reference's reached-limit is met, or when nothing is left to find.
/// Iterative depth-first worklist; parents are pushed in reverse so the
/// first parent is explored first. Diamond ancestries may revisit commits;
/// the stop set and expected-set exhaustion bound the work.
///
/// Returns the commits this reference claimed. As a side effect, records
/// one new stop point in the context: the next unvisited frontier commit
/// when the limit was hit (falling back to the last-reached commit if the
/// frontier is empty), otherwise the last-reached commit, otherwise the
/// reference's own tip.
pub fn scan_reference_history(
    graph: &dyn CommitGraph,
    reference: &ScanReference,
    ctx: &mut ScanContext,
) -> StagekeepResult<Vec<Oid>> {
    let mut reached = Vec::new();
    let mut pending = vec![reference.target];
    let mut limit_frontier: Option<Option<Oid>> = None;

    while let Some(commit) = pending.pop() {
        if ctx.stop.contains(&commit) {
            continue;
        }

        if ctx.expected.remove(&commit) {
            reached.push(commit);
        }

        if reference.reached_limit != 0 && reached.len() == reference.reached_limit {
            limit_frontier = Some(pending.pop());
            break;
        }
        if ctx.expected.is_empty() {
            break;
        }

        let parents = graph.commit_parents(commit)?;
        for parent in parents.into_iter().rev() {
            pending.push(parent);
        }
    }

    let stop_point = match limit_frontier {
        Some(Some(frontier)) => frontier,
        // Limit hit with an empty frontier, or a walk that ran to
        // completion: the last claim is the boundary, the tip if none
        _ => *reached.last().unwrap_or(&reference.target),
    };
    ctx.stop.insert(stop_point);

    debug!(
        "Reference {} reached {} commit(s), stop point {}",
        reference.name,
        reached.len(),
        stop_point
    );

    Ok(reached)
}

/// Scan every reference in selector order, merging per-reference results
/// into one de-duplicated, first-seen-ordered reached list.
pub fn scan_references_history(
    graph: &dyn CommitGraph,
    references: &[ScanReference],
    expected: HashSet<Oid>,
) -> StagekeepResult<ScanSummary> {
    let mut ctx = ScanContext::new(expected);
    let mut reached = Vec::new();
    let mut seen = HashSet::new();

    for reference in references {
        let ref_reached = scan_reference_history(graph, reference, &mut ctx)?;
        for commit in ref_reached {
            if seen.insert(commit) {
                reached.push(commit);
            }
        }
    }

    Ok(ScanSummary {
        reached,
        stop_commits: ctx.stop,
        unreached: ctx.expected,
    })
}
