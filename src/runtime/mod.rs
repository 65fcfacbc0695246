//! Container runtime access
//!
//! Host cleanup needs a small slice of the runtime: enumerate containers
//! and dangling images with their labels, probe image usage, and remove by
//! id. The trait keeps the sweep logic testable without a live runtime.

pub mod podman;

pub use podman::PodmanRuntime;

use crate::error::StagekeepResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// A container as reported by the runtime
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Runtime container id
    pub id: String,
    /// All names attached to the container
    pub names: Vec<String>,
    /// Image reference the container was created from
    pub image: String,
    /// Container labels
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    /// First name with the given prefix, if any
    pub fn name_with_prefix(&self, prefix: &str) -> Option<&str> {
        self.names
            .iter()
            .map(String::as_str)
            .find(|n| n.starts_with(prefix))
    }
}

/// A dangling image as reported by the runtime
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Runtime image id
    pub id: String,
    /// Image labels
    pub labels: HashMap<String, String>,
}

/// One failed removal inside an otherwise-continuing batch
#[derive(Debug, Clone)]
pub struct RemovalFailure {
    pub id: String,
    pub reason: String,
}

/// Runtime operations needed by host cleanup. Removals are per-item: a
/// failure is reported in the returned list, never as an error, so one bad
/// item cannot abort the batch. Removing an absent id succeeds.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// All containers (running or not) whose name carries the prefix
    async fn list_containers(&self, name_prefix: &str) -> StagekeepResult<Vec<ContainerInfo>>;

    /// All dangling images with their labels
    async fn list_dangling_images(&self) -> StagekeepResult<Vec<ImageInfo>>;

    /// Whether any container still uses the image
    async fn image_in_use(&self, image_id: &str) -> StagekeepResult<bool>;

    /// Remove containers by id, forcing (stop first) when asked
    async fn remove_containers(&self, ids: &[String], force: bool) -> Vec<RemovalFailure>;

    /// Remove images by id
    async fn remove_images(&self, ids: &[String]) -> Vec<RemovalFailure>;
}
