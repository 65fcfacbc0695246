//! Remote repository cache
//!
//! Maintains a local bare mirror of a remote repository. Clone and fetch
//! are serialized across processes with a blocking advisory lock keyed by
//! the repository name, because two processes racing to mutate the same
//! clone directory must wait for each other, not skip.

use crate::error::{StagekeepError, StagekeepResult};
use crate::gitcache::endpoint::Endpoint;
use crate::lock::{remote_repo_lock_name, HostLocker};
use crate::scan::{CommitGraph, RefKind, ScanReference};
use chrono::{DateTime, TimeZone, Utc};
use git2::{AutotagOption, FetchOptions, Oid, RemoteCallbacks, Repository};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Refspec mapping upstream branches into remote-tracking refs of the mirror
const BRANCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

/// Handle on one remote repository and its local cache entry
pub struct RemoteGitRepo {
    name: String,
    url: String,
    endpoint: Endpoint,
    clone_root: PathBuf,
    worktree_root: PathBuf,
    locker: HostLocker,
    lock_timeout: Duration,
}

impl RemoteGitRepo {
    /// Create a handle, validating the url eagerly
    pub fn open(
        name: impl Into<String>,
        url: impl Into<String>,
        clone_root: impl Into<PathBuf>,
        worktree_root: impl Into<PathBuf>,
        locker: HostLocker,
        lock_timeout: Duration,
    ) -> StagekeepResult<Self> {
        let url = url.into();
        let endpoint = Endpoint::parse(&url)?;
        Ok(Self {
            name: name.into(),
            url,
            endpoint,
            clone_root: clone_root.into(),
            worktree_root: worktree_root.into(),
            locker,
            lock_timeout,
        })
    }

    /// Repository name used for lock scoping
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local path of the bare mirror
    pub fn clone_path(&self) -> PathBuf {
        self.clone_root.join(self.endpoint.cache_relative_path())
    }

    /// Local path of this repository's work-tree cache entry
    pub fn worktree_cache_dir(&self) -> PathBuf {
        self.worktree_root.join(self.endpoint.cache_relative_path())
    }

    /// Clone if absent, otherwise fetch. The normal entry point before a scan.
    pub fn sync(&self) -> StagekeepResult<()> {
        if self.clone_if_absent()? {
            return Ok(());
        }
        self.fetch()
    }

    /// Clone the mirror if it does not exist yet. Returns true if a clone
    /// was performed.
    pub fn clone_if_absent(&self) -> StagekeepResult<bool> {
        if self.clone_path().exists() {
            return Ok(false);
        }

        self.with_repo_lock(|| {
            // Another process may have cloned while we waited for the lock
            if self.clone_path().exists() {
                return Ok(false);
            }

            info!("Cloning {}", self.url);

            let clone_path = self.clone_path();
            if let Some(parent) = clone_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| StagekeepError::DirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }

            // Stage into a tmp dir and rename so a failed clone never leaves
            // a half-populated mirror at the final path
            let staging = clone_path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
            let result = self.clone_into(&staging).and_then(|()| {
                std::fs::rename(&staging, &clone_path).map_err(|e| {
                    StagekeepError::io(
                        format!(
                            "renaming {} to {}",
                            staging.display(),
                            clone_path.display()
                        ),
                        e,
                    )
                })
            });

            if result.is_err() {
                let _ = std::fs::remove_dir_all(&staging);
            }
            result.map(|()| true)
        })
    }

    fn clone_into(&self, path: &Path) -> StagekeepResult<()> {
        let repo = Repository::init_bare(path)
            .map_err(|e| StagekeepError::git(format!("init mirror at {}", path.display()), e))?;
        repo.remote("origin", &self.url)
            .map_err(|e| StagekeepError::git(format!("adding remote for {}", self.url), e))?;
        self.fetch_origin(&repo)
    }

    /// Fetch the mirror, updating the stored remote url if the configured
    /// url changed since the clone was made.
    pub fn fetch(&self) -> StagekeepResult<()> {
        self.with_repo_lock(|| {
            let repo = self.open_repo()?;

            let current_url = repo
                .find_remote("origin")
                .map_err(|e| StagekeepError::git("looking up remote 'origin'", e))?
                .url()
                .map(str::to_string);
            if current_url.as_deref() != Some(self.url.as_str()) {
                debug!("Updating remote url of {} to {}", self.name, self.url);
                repo.remote_set_url("origin", &self.url)
                    .map_err(|e| StagekeepError::git("updating remote url", e))?;
            }

            info!("Fetching origin of {}", self.url);
            self.fetch_origin(&repo)
        })
    }

    fn fetch_origin(&self, repo: &Repository) -> StagekeepResult<()> {
        let mut remote = repo
            .find_remote("origin")
            .map_err(|e| StagekeepError::git("looking up remote 'origin'", e))?;

        let config = repo.config().ok();
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            if allowed.is_ssh_key() {
                if let Some(user) = username_from_url {
                    return git2::Cred::ssh_key_from_agent(user);
                }
            }
            if allowed.is_user_pass_plaintext() {
                if let Some(ref cfg) = config {
                    if let Ok(cred) = git2::Cred::credential_helper(cfg, url, username_from_url) {
                        return Ok(cred);
                    }
                }
            }
            git2::Cred::default()
        });

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options.download_tags(AutotagOption::All);

        remote
            .fetch(&[BRANCH_REFSPEC], Some(&mut options), None)
            .map_err(|e| StagekeepError::git(format!("fetching {}", self.url), e))
    }

    fn open_repo(&self) -> StagekeepResult<Repository> {
        Repository::open(self.clone_path()).map_err(|e| {
            StagekeepError::git(format!("opening repo at {}", self.clone_path().display()), e)
        })
    }

    fn with_repo_lock<T>(&self, f: impl FnOnce() -> StagekeepResult<T>) -> StagekeepResult<T> {
        self.locker
            .with_lock(&remote_repo_lock_name(&self.name), self.lock_timeout, f)
    }

    /// Enumerate scan candidates: remote-tracking branches of the given
    /// upstream plus all tags, with annotated tags dereferenced to their
    /// target commit. Traversal limits are assigned later by the selector.
    pub fn scan_references(&self, upstream: &str) -> StagekeepResult<Vec<ScanReference>> {
        let repo = self.open_repo()?;
        let branch_prefix = format!("refs/remotes/{upstream}/");
        let tag_prefix = "refs/tags/";

        let mut refs = Vec::new();
        let iter = repo
            .references()
            .map_err(|e| StagekeepError::git("listing references", e))?;
        for reference in iter {
            let reference =
                reference.map_err(|e| StagekeepError::git("iterating references", e))?;
            let Some(full_name) = reference.name() else {
                continue; // non-utf8 reference name
            };

            let (short_name, kind) = if let Some(rest) = full_name.strip_prefix(&branch_prefix) {
                if rest == "HEAD" {
                    continue;
                }
                (rest.to_string(), RefKind::Branch)
            } else if let Some(rest) = full_name.strip_prefix(tag_prefix) {
                (rest.to_string(), RefKind::Tag)
            } else {
                continue;
            };

            // Dereferences annotated tags down to the commit
            let commit = reference.peel_to_commit().map_err(|e| {
                StagekeepError::git(format!("resolving reference {full_name}"), e)
            })?;

            refs.push(ScanReference {
                name: short_name,
                kind,
                target: commit.id(),
                committed_at: commit_time(commit.time()),
                reached_limit: 0,
            });
        }

        Ok(refs)
    }

    /// Whether the given commit exists in the mirror
    pub fn is_commit_exists(&self, commit: Oid) -> StagekeepResult<bool> {
        let repo = self.open_repo()?;
        let result = match repo.find_commit(commit) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(StagekeepError::CommitRead {
                commit: commit.to_string(),
                source: e,
            }),
        };
        result
    }

    /// Open a commit-graph view for the reachability scanner
    pub fn commit_graph(&self) -> StagekeepResult<RepoCommitGraph> {
        Ok(RepoCommitGraph {
            repo: self.open_repo()?,
        })
    }
}

/// Commit-parent access backed by the local mirror
pub struct RepoCommitGraph {
    repo: Repository,
}

impl CommitGraph for RepoCommitGraph {
    fn commit_parents(&self, commit: Oid) -> StagekeepResult<Vec<Oid>> {
        let commit = self
            .repo
            .find_commit(commit)
            .map_err(|e| StagekeepError::CommitRead {
                commit: commit.to_string(),
                source: e,
            })?;
        Ok(commit.parent_ids().collect())
    }
}

fn commit_time(time: git2::Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default())
}
