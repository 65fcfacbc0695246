//! Image registry access
//!
//! The wire client is a narrow trait over the registry HTTP API; the
//! `ImagesRepo` layer on top maps logical (project, image-name) identities
//! onto physical repository paths and filters tags down to tool-owned
//! artifacts.

pub mod http;
pub mod repo;

pub use http::HttpRegistryClient;
pub use repo::{ImagesRepo, RepoLayout};

use crate::error::StagekeepResult;
use async_trait::async_trait;
use git2::Oid;
use std::collections::HashMap;

/// Label keys attached to published artifacts
pub mod labels {
    /// Marks an artifact as stagekeep-owned; nothing without it is touched
    pub const OWNED: &str = "io.stagekeep.owned";
    /// Logical image name, required to bucket tags in mono-repo layout
    pub const IMAGE_NAME: &str = "io.stagekeep.image-name";
    /// Commit that produced the artifact
    pub const COMMIT: &str = "io.stagekeep.commit";
}

/// One registry-resident artifact: a tag plus its label metadata
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    /// Physical repository path the tag lives under
    pub repository: String,
    /// Tag name
    pub tag: String,
    /// Label map from the image config
    pub labels: HashMap<String, String>,
}

impl ArtifactInfo {
    /// Full reference for display and error context
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    /// Whether the owned label is present and true
    pub fn is_owned(&self) -> bool {
        self.labels.get(labels::OWNED).map(String::as_str) == Some("true")
    }

    /// Logical image name from labels, if any
    pub fn image_name(&self) -> Option<&str> {
        self.labels.get(labels::IMAGE_NAME).map(String::as_str)
    }

    /// Producing commit parsed from labels. `None` when the label is
    /// missing or not a valid hash; such artifacts are never deleted.
    pub fn source_commit(&self) -> Option<Oid> {
        self.labels
            .get(labels::COMMIT)
            .and_then(|hash| Oid::from_str(hash).ok())
    }
}

/// Registry wire operations. Deletions are idempotent: deleting an absent
/// tag or repository succeeds.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// List tags under a repository path; absent repositories list empty
    async fn tags(&self, repository: &str) -> StagekeepResult<Vec<String>>;

    /// Fetch the label map of one tag
    async fn tag_labels(
        &self,
        repository: &str,
        tag: &str,
    ) -> StagekeepResult<HashMap<String, String>>;

    /// Delete one tag
    async fn delete_tag(&self, repository: &str, tag: &str) -> StagekeepResult<()>;

    /// Create a logical repository (a no-op for registries that create on
    /// first push)
    async fn create_repo(&self, repository: &str) -> StagekeepResult<()>;

    /// Delete a logical repository and everything under it
    async fn delete_repo(&self, repository: &str) -> StagekeepResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(labels: &[(&str, &str)]) -> ArtifactInfo {
        ArtifactInfo {
            repository: "registry.example.com/acme/shop".to_string(),
            tag: "abc".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn owned_requires_true_value() {
        assert!(artifact(&[(labels::OWNED, "true")]).is_owned());
        assert!(!artifact(&[(labels::OWNED, "false")]).is_owned());
        assert!(!artifact(&[]).is_owned());
    }

    #[test]
    fn source_commit_parses_valid_hash() {
        let hash = "1111111111111111111111111111111111111111";
        let a = artifact(&[(labels::COMMIT, hash)]);
        assert_eq!(a.source_commit().unwrap().to_string(), hash);

        assert!(artifact(&[(labels::COMMIT, "not-a-hash")])
            .source_commit()
            .is_none());
        assert!(artifact(&[]).source_commit().is_none());
    }

    #[test]
    fn reference_format() {
        let a = artifact(&[]);
        assert_eq!(a.reference(), "registry.example.com/acme/shop:abc");
    }
}
