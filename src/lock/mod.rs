//! Advisory host locks
//!
//! Named mutual-exclusion tokens backed by `flock(2)` on lock files. Locks
//! are advisory: nothing stops a non-cooperating process from touching the
//! resource. Two acquisition modes exist, matching the two decisions callers
//! make: `try_acquire` (contention means the caller skips the resource) and
//! `acquire` with a timeout (contention means the caller waits, then fails).
//! The skip-on-contention decision itself belongs to the caller, never here.

use crate::error::{StagekeepError, StagekeepResult};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Poll interval for blocking acquires. `flock` has no timeout of its own,
/// so a blocking acquire is a non-blocking attempt in a sleep loop.
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default timeout for whole-phase blocking locks (clone/fetch, host cleanup)
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// Lock name for a local container
pub fn container_lock_name(container_name: &str) -> String {
    format!("container.{container_name}")
}

/// Lock name for a local image
pub fn image_lock_name(image_name: &str) -> String {
    format!("image.{image_name}")
}

/// Lock name for a remote repository clone/fetch
pub fn remote_repo_lock_name(repo_name: &str) -> String {
    format!("remote_git_mapping.{repo_name}")
}

/// Lock name for a temp directory entry
pub fn tmp_entry_lock_name(entry_name: &str) -> String {
    format!("tmp.{entry_name}")
}

/// An acquired advisory lock. Released on drop (closing the file descriptor
/// drops the flock).
#[derive(Debug)]
pub struct LockGuard {
    name: String,
    _file: File,
}

impl LockGuard {
    /// The lock name this guard holds
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        trace!("Released lock '{}'", self.name);
    }
}

/// Advisory lock service scoped to one locks directory
#[derive(Debug, Clone)]
pub struct HostLocker {
    locks_dir: PathBuf,
}

impl HostLocker {
    /// Create a locker rooted at the given directory, creating it if needed
    pub fn new(locks_dir: impl Into<PathBuf>) -> StagekeepResult<Self> {
        let locks_dir = locks_dir.into();
        std::fs::create_dir_all(&locks_dir).map_err(|e| StagekeepError::DirCreate {
            path: locks_dir.clone(),
            source: e,
        })?;
        Ok(Self { locks_dir })
    }

    /// Map a lock name to its file path. Names can contain path separators
    /// and arbitrary punctuation, so the file name is a sanitized prefix
    /// plus a short content hash to keep distinct names distinct.
    fn lock_path(&self, name: &str) -> PathBuf {
        let sanitized: String = name
            .chars()
            .take(48)
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            })
            .collect();
        let digest = Sha256::digest(name.as_bytes());
        let suffix = hex::encode(&digest[..6]);
        self.locks_dir.join(format!("{sanitized}-{suffix}.lock"))
    }

    fn open_lock_file(&self, name: &str) -> StagekeepResult<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path(name))
            .map_err(|e| StagekeepError::Lock {
                name: name.to_string(),
                source: e,
            })
    }

    /// Attempt a non-blocking exclusive acquire.
    ///
    /// Returns `Ok(None)` when another process holds the lock. That outcome
    /// is not an error; callers decide what contention means.
    pub fn try_acquire(&self, name: &str) -> StagekeepResult<Option<LockGuard>> {
        let file = self.open_lock_file(name)?;
        match flock_exclusive_nonblocking(&file) {
            Ok(true) => {
                debug!("Acquired lock '{}'", name);
                Ok(Some(LockGuard {
                    name: name.to_string(),
                    _file: file,
                }))
            }
            Ok(false) => {
                debug!("Lock '{}' held elsewhere", name);
                Ok(None)
            }
            Err(e) => Err(StagekeepError::Lock {
                name: name.to_string(),
                source: e,
            }),
        }
    }

    /// Blocking exclusive acquire with a timeout.
    ///
    /// Fails with `LockTimeout` if the lock cannot be taken within the
    /// deadline.
    pub fn acquire(&self, name: &str, timeout: Duration) -> StagekeepResult<LockGuard> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = self.try_acquire(name)? {
                return Ok(guard);
            }
            if Instant::now() >= deadline {
                return Err(StagekeepError::LockTimeout {
                    name: name.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            std::thread::sleep(ACQUIRE_POLL_INTERVAL);
        }
    }

    /// Run `f` while holding the named lock (blocking acquire with timeout)
    pub fn with_lock<T>(
        &self,
        name: &str,
        timeout: Duration,
        f: impl FnOnce() -> StagekeepResult<T>,
    ) -> StagekeepResult<T> {
        let _guard = self.acquire(name, timeout)?;
        f()
    }
}

#[cfg(unix)]
fn flock_exclusive_nonblocking(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: fd comes from an open File that outlives this call, and
    // LOCK_EX | LOCK_NB is a valid flock operation.
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

#[cfg(not(unix))]
fn flock_exclusive_nonblocking(_file: &File) -> io::Result<bool> {
    Ok(true)
}
