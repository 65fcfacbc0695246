//! Host cleanup sweep
//!
//! Removes leftover stage-build containers, orphaned stage images, and
//! temp directory garbage from the local host. The whole sweep runs under
//! the host-cleanup lock; individual resources are additionally guarded by
//! their own locks so a concurrent build keeps what it is using.

use crate::config::WORKTREE_CACHE_VERSION;
use crate::error::{StagekeepError, StagekeepResult};
use crate::lock::{container_lock_name, image_lock_name, tmp_entry_lock_name, HostLocker};
use crate::registry::labels;
use crate::runtime::{ContainerRuntime, RemovalFailure};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name prefix of stage-build containers
pub const STAGE_CONTAINER_PREFIX: &str = "stagekeep-stage-build-";

/// Lock serializing whole-host sweeps
pub const HOST_CLEANUP_LOCK: &str = "host-cleanup";

/// Lock serializing temp garbage collection
pub const GC_LOCK: &str = "gc";

/// A resource the sweep saw but deliberately left alone
#[derive(Debug, Clone)]
pub struct SkippedItem {
    pub subject: String,
    pub reason: String,
}

/// Outcome of one sweep. Per-item failures live here, not in the error
/// channel; the sweep itself fails only on enumeration or lock errors.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed_containers: Vec<String>,
    pub removed_images: Vec<String>,
    pub removed_tmp_entries: Vec<PathBuf>,
    pub skipped: Vec<SkippedItem>,
    pub failures: Vec<RemovalFailure>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.removed_containers.is_empty()
            && self.removed_images.is_empty()
            && self.removed_tmp_entries.is_empty()
            && self.skipped.is_empty()
            && self.failures.is_empty()
    }

    fn skip(&mut self, subject: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedItem {
            subject: subject.into(),
            reason: reason.into(),
        });
    }
}

/// Host sweep executor
pub struct HostSweeper<'a, R: ContainerRuntime + ?Sized> {
    locker: &'a HostLocker,
    runtime: &'a R,
    tmp_dir: PathBuf,
    worktrees_root: PathBuf,
    lock_timeout: Duration,
    dry_run: bool,
}

impl<'a, R: ContainerRuntime + ?Sized> HostSweeper<'a, R> {
    pub fn new(
        locker: &'a HostLocker,
        runtime: &'a R,
        tmp_dir: PathBuf,
        worktrees_root: PathBuf,
        lock_timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            locker,
            runtime,
            tmp_dir,
            worktrees_root,
            lock_timeout,
            dry_run,
        }
    }

    /// Run the full sweep: containers, then dangling images, then temp
    /// garbage. Holds the host-cleanup lock throughout.
    pub async fn run(&self) -> StagekeepResult<SweepReport> {
        let _host_lock = self.locker.acquire(HOST_CLEANUP_LOCK, self.lock_timeout)?;
        info!("Host cleanup started (dry_run={})", self.dry_run);

        let mut report = SweepReport::default();
        self.sweep_containers(&mut report).await?;
        self.sweep_dangling_images(&mut report).await?;
        self.sweep_tmp(&mut report)?;

        Ok(report)
    }

    /// Remove leftover stage-build containers. Each container's lock is
    /// taken non-blocking and held only across that container's removal,
    /// so a concurrent build never waits on the rest of the batch.
    /// Contention means a build still owns the container.
    async fn sweep_containers(&self, report: &mut SweepReport) -> StagekeepResult<()> {
        let containers = self
            .runtime
            .list_containers(STAGE_CONTAINER_PREFIX)
            .await?;

        for container in containers {
            let Some(name) = container.name_with_prefix(STAGE_CONTAINER_PREFIX) else {
                warn!("Container {} has no stage-build name, skipping", container.id);
                report.skip(&container.id, "unrecognized name");
                continue;
            };
            let Some(_guard) = self.locker.try_acquire(&container_lock_name(name))? else {
                debug!("Container {} is locked, skipping", name);
                report.skip(name, "locked by another process");
                continue;
            };

            if self.dry_run {
                report.removed_containers.push(name.to_string());
                continue;
            }

            let failures = self
                .runtime
                .remove_containers(std::slice::from_ref(&container.id), true)
                .await;
            if failures.is_empty() {
                report.removed_containers.push(name.to_string());
            } else {
                report.failures.extend(failures);
            }
            // Lock releases here, before the next container is considered
        }

        Ok(())
    }

    /// Remove dangling stage images. Only images carrying the owned label
    /// are candidates. An image-name label points at a build lock; it is
    /// probed non-blocking and released as soon as the keep-or-remove
    /// decision is made. Images in use by any container are kept.
    async fn sweep_dangling_images(&self, report: &mut SweepReport) -> StagekeepResult<()> {
        let images = self.runtime.list_dangling_images().await?;

        let mut ids = Vec::new();
        for image in images {
            if image.labels.get(labels::OWNED).map(String::as_str) != Some("true") {
                debug!("Dangling image {} is not owned, leaving it", image.id);
                continue;
            }

            match image.labels.get(labels::IMAGE_NAME) {
                Some(image_name) => {
                    let Some(guard) = self.locker.try_acquire(&image_lock_name(image_name))?
                    else {
                        debug!("Image {} is locked, skipping", image.id);
                        report.skip(&image.id, "locked by another process");
                        continue;
                    };
                    if self.runtime.image_in_use(&image.id).await? {
                        report.skip(&image.id, "in use by a container");
                    } else {
                        ids.push(image.id);
                    }
                    drop(guard);
                }
                None => ids.push(image.id),
            }
        }

        if self.dry_run {
            report.removed_images.extend(ids);
            return Ok(());
        }

        let failures = self.runtime.remove_images(&ids).await;
        let failed: HashSet<&str> = failures.iter().map(|f| f.id.as_str()).collect();
        report
            .removed_images
            .extend(ids.iter().filter(|id| !failed.contains(id.as_str())).cloned());
        report.failures.extend(failures);
        Ok(())
    }

    /// Collect temp garbage: entries under the temp directory plus work-tree
    /// cache roots left behind by older layout versions. Runs under the gc
    /// lock; each entry is additionally guarded by its own lock so an entry
    /// still being populated survives.
    fn sweep_tmp(&self, report: &mut SweepReport) -> StagekeepResult<()> {
        let _gc_lock = self.locker.acquire(GC_LOCK, self.lock_timeout)?;

        for path in list_dir(&self.tmp_dir)? {
            self.sweep_tmp_entry(&path, report)?;
        }

        for path in list_dir(&self.worktrees_root)? {
            if path.file_name().and_then(|n| n.to_str()) == Some(WORKTREE_CACHE_VERSION) {
                continue;
            }
            self.sweep_tmp_entry(&path, report)?;
        }

        Ok(())
    }

    fn sweep_tmp_entry(&self, path: &Path, report: &mut SweepReport) -> StagekeepResult<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(_guard) = self.locker.try_acquire(&tmp_entry_lock_name(&name))? else {
            debug!("Temp entry {} is locked, skipping", name);
            report.skip(path.display().to_string(), "locked by another process");
            return Ok(());
        };

        if !self.dry_run {
            let result = if path.is_dir() {
                std::fs::remove_dir_all(path)
            } else {
                std::fs::remove_file(path)
            };
            if let Err(e) = result {
                warn!("Failed to remove temp entry {}: {}", path.display(), e);
                report.failures.push(RemovalFailure {
                    id: path.display().to_string(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        }

        report.removed_tmp_entries.push(path.to_path_buf());
        Ok(())
    }
}

/// Entries of a directory, tolerating its absence
fn list_dir(dir: &Path) -> StagekeepResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StagekeepError::io(format!("reading {}", dir.display()), e)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| StagekeepError::io(format!("reading {}", dir.display()), e))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
