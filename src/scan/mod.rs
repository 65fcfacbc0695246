//! Commit-graph reachability scanning
//!
//! Decides which candidate commits are still reachable from retained git
//! references. The selector picks and orders references; the history
//! scanner walks the commit graph claiming candidates and accumulating
//! stop commits so shared ancestry is walked once.

pub mod history;
pub mod refs;

pub use history::{scan_reference_history, scan_references_history, ScanContext, ScanSummary};
pub use refs::{select_references, RetentionPolicy};

use crate::error::StagekeepResult;
use chrono::{DateTime, Utc};
use git2::Oid;

/// Kind of a scan reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

/// A named pointer into the commit graph, materialized fresh for each scan
#[derive(Debug, Clone)]
pub struct ScanReference {
    /// Short reference name (branch or tag name)
    pub name: String,
    /// Branch or tag
    pub kind: RefKind,
    /// Target commit, with annotated tags already dereferenced
    pub target: Oid,
    /// Committer timestamp of the target commit
    pub committed_at: DateTime<Utc>,
    /// Stop descending after this many newly-claimed commits (0 = unlimited)
    pub reached_limit: usize,
}

/// Commit-parent access for the scanner. The production implementation is
/// backed by the repository mirror; tests use an in-memory DAG.
pub trait CommitGraph {
    /// Parent hashes of the given commit. Merge commits have several,
    /// root commits none. Errors abort the enclosing scan.
    fn commit_parents(&self, commit: Oid) -> StagekeepResult<Vec<Oid>>;
}
