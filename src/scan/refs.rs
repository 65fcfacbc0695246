//! Reference selection and retention policy
//!
//! Orders and filters the references the history scanner will walk. The
//! output order matters: it decides which reference claims a shared
//! ancestor commit first, so branches (walked in full) come before tags
//! (which only stand for their exact target).

use crate::scan::{RefKind, ScanReference};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Optional retention limits layered on top of the base policy. The base
/// policy alone keeps every upstream branch and every tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    /// Drop references whose tip committer time is older than this many days
    pub period_days: Option<u32>,

    /// Keep at most this many branches (newest first)
    pub branch_limit: Option<usize>,

    /// Keep at most this many tags (newest first)
    pub tag_limit: Option<usize>,
}

/// Select, order, and budget references for scanning.
///
/// Sorting is by target-commit committer time descending, stable so equal
/// timestamps keep their enumeration order. After sorting, branches are
/// emitted before tags, each partition preserving its relative order.
/// Branches get unlimited traversal; a tag's relevant state is exactly its
/// target commit, so tags get a reached-limit of 1.
pub fn select_references(
    mut refs: Vec<ScanReference>,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<ScanReference> {
    refs.sort_by(|a, b| b.committed_at.cmp(&a.committed_at));

    let (branches, tags): (Vec<_>, Vec<_>) =
        refs.into_iter().partition(|r| r.kind == RefKind::Branch);

    let branches = apply_limits(branches, policy, now, "branch");
    let tags = apply_limits(tags, policy, now, "tag");

    let mut result = branches;
    result.extend(tags.into_iter().map(|mut r| {
        r.reached_limit = 1;
        r
    }));
    result
}

fn apply_limits(
    refs: Vec<ScanReference>,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    label: &str,
) -> Vec<ScanReference> {
    let mut refs = refs;

    if let Some(days) = policy.period_days {
        let cutoff = now - Duration::days(i64::from(days));
        refs.retain(|r| {
            let keep = r.committed_at >= cutoff;
            if !keep {
                debug!("Reference {} skipped by period", r.name);
            }
            keep
        });
    }

    let limit = match label {
        "branch" => policy.branch_limit,
        _ => policy.tag_limit,
    };
    if let Some(limit) = limit {
        if refs.len() > limit {
            for skipped in &refs[limit..] {
                debug!("Reference {} skipped by limit", skipped.name);
            }
            refs.truncate(limit);
        }
    }

    refs
}
