//! Logical image repository over a physical registry layout
//!
//! Two layouts exist. Mono keeps every image of the project in one
//! repository path and distinguishes images by label; multi gives each
//! image its own repository path under the project address. The layout is
//! fixed when the repo handle is built and every operation goes through it.

use crate::config::RepoMode;
use crate::error::StagekeepResult;
use crate::registry::{ArtifactInfo, RegistryClient};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Physical layout of the project's artifacts in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoLayout {
    /// Single repository, images bucketed by label
    Mono,
    /// One repository per image under the project address
    Multi,
}

impl RepoLayout {
    /// Resolve the configured mode to a concrete layout. Auto picks multi,
    /// the layout registries without path-depth limits default to.
    pub fn resolve(mode: RepoMode) -> Self {
        match mode {
            RepoMode::Mono => RepoLayout::Mono,
            RepoMode::Multi | RepoMode::Auto => RepoLayout::Multi,
        }
    }
}

/// Failable artifact predicate applied during selection
pub type ArtifactPredicate<'a> = &'a dyn Fn(&ArtifactInfo) -> StagekeepResult<bool>;

/// Handle to the project's artifacts in the registry
pub struct ImagesRepo<C> {
    client: C,
    address: String,
    layout: RepoLayout,
}

impl<C: RegistryClient> ImagesRepo<C> {
    pub fn new(client: C, address: impl Into<String>, layout: RepoLayout) -> Self {
        Self {
            client,
            address: address.into(),
            layout,
        }
    }

    pub fn layout(&self) -> RepoLayout {
        self.layout
    }

    /// Physical repository path holding the given image's tags
    pub fn image_repository(&self, image_name: &str) -> String {
        match self.layout {
            RepoLayout::Mono => self.address.clone(),
            RepoLayout::Multi => format!("{}/{}", self.address, image_name),
        }
    }

    /// Enumerate owned artifacts for the requested images, grouped by image
    /// name. An artifact is selected only when the owned label is set, its
    /// image-name label matches a requested image, and the predicate (when
    /// given) accepts it. Unlabeled or foreign tags are ignored with a
    /// debug trace; a predicate error aborts the whole selection.
    pub async fn select_artifacts(
        &self,
        image_names: &[String],
        predicate: Option<ArtifactPredicate<'_>>,
    ) -> StagekeepResult<HashMap<String, Vec<ArtifactInfo>>> {
        let mut selected: HashMap<String, Vec<ArtifactInfo>> =
            image_names.iter().map(|n| (n.clone(), Vec::new())).collect();

        match self.layout {
            RepoLayout::Mono => {
                let artifacts = self.list_repository(&self.address).await?;
                for artifact in artifacts {
                    let Some(image) = artifact.image_name().map(str::to_string) else {
                        warn!(
                            "Owned artifact {} has no image-name label, ignoring",
                            artifact.reference()
                        );
                        continue;
                    };
                    let Some(bucket) = selected.get_mut(&image) else {
                        debug!(
                            "Artifact {} belongs to unrequested image {}",
                            artifact.reference(),
                            image
                        );
                        continue;
                    };
                    if Self::accepted(&artifact, predicate)? {
                        bucket.push(artifact);
                    }
                }
            }
            RepoLayout::Multi => {
                for image in image_names {
                    let repository = self.image_repository(image);
                    let mut bucket = Vec::new();
                    for artifact in self.list_repository(&repository).await? {
                        if Self::accepted(&artifact, predicate)? {
                            bucket.push(artifact);
                        }
                    }
                    selected.insert(image.clone(), bucket);
                }
            }
        }

        Ok(selected)
    }

    /// Delete one artifact's tag
    pub async fn delete_artifact(&self, artifact: &ArtifactInfo) -> StagekeepResult<()> {
        debug!("Deleting artifact {}", artifact.reference());
        self.client
            .delete_tag(&artifact.repository, &artifact.tag)
            .await
    }

    /// Ensure the image's repository exists (mono layout shares one)
    pub async fn create_image_repo(&self, image_name: &str) -> StagekeepResult<()> {
        self.client
            .create_repo(&self.image_repository(image_name))
            .await
    }

    /// Delete the image's repository. In mono layout the shared repository
    /// hosts other images, so only the image's own tags are removed.
    pub async fn delete_image_repo(&self, image_name: &str) -> StagekeepResult<()> {
        match self.layout {
            RepoLayout::Multi => self.client.delete_repo(&self.image_repository(image_name)).await,
            RepoLayout::Mono => {
                for artifact in self.list_repository(&self.address).await? {
                    if artifact.image_name() == Some(image_name) {
                        self.client
                            .delete_tag(&artifact.repository, &artifact.tag)
                            .await?;
                    }
                }
                Ok(())
            }
        }
    }

    /// List a physical repository, keeping owned artifacts only
    async fn list_repository(&self, repository: &str) -> StagekeepResult<Vec<ArtifactInfo>> {
        let mut artifacts = Vec::new();
        for tag in self.client.tags(repository).await? {
            let labels = self.client.tag_labels(repository, &tag).await?;
            let artifact = ArtifactInfo {
                repository: repository.to_string(),
                tag,
                labels,
            };
            if artifact.is_owned() {
                artifacts.push(artifact);
            } else {
                debug!("Tag {} is not owned, ignoring", artifact.reference());
            }
        }
        Ok(artifacts)
    }

    fn accepted(
        artifact: &ArtifactInfo,
        predicate: Option<ArtifactPredicate<'_>>,
    ) -> StagekeepResult<bool> {
        match predicate {
            Some(keep) => keep(artifact),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagekeepError;
    use crate::registry::labels;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory registry: repository path -> [(tag, labels)]
    struct FakeRegistry {
        repos: HashMap<String, Vec<(String, HashMap<String, String>)>>,
        queried: Mutex<Vec<String>>,
        deleted_tags: Mutex<Vec<(String, String)>>,
        deleted_repos: Mutex<Vec<String>>,
        created_repos: Mutex<Vec<String>>,
    }

    impl FakeRegistry {
        fn new() -> Self {
            Self {
                repos: HashMap::new(),
                queried: Mutex::new(Vec::new()),
                deleted_tags: Mutex::new(Vec::new()),
                deleted_repos: Mutex::new(Vec::new()),
                created_repos: Mutex::new(Vec::new()),
            }
        }

        fn add(&mut self, repository: &str, tag: &str, labels: &[(&str, &str)]) {
            self.repos.entry(repository.to_string()).or_default().push((
                tag.to_string(),
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
        }
    }

    #[async_trait]
    impl RegistryClient for FakeRegistry {
        async fn tags(&self, repository: &str) -> StagekeepResult<Vec<String>> {
            self.queried.lock().unwrap().push(repository.to_string());
            Ok(self
                .repos
                .get(repository)
                .map(|tags| tags.iter().map(|(t, _)| t.clone()).collect())
                .unwrap_or_default())
        }

        async fn tag_labels(
            &self,
            repository: &str,
            tag: &str,
        ) -> StagekeepResult<HashMap<String, String>> {
            self.repos
                .get(repository)
                .and_then(|tags| tags.iter().find(|(t, _)| t == tag))
                .map(|(_, labels)| labels.clone())
                .ok_or_else(|| StagekeepError::registry(format!("{repository}:{tag}"), "missing"))
        }

        async fn delete_tag(&self, repository: &str, tag: &str) -> StagekeepResult<()> {
            // Absent tags delete successfully, like the wire client
            self.deleted_tags
                .lock()
                .unwrap()
                .push((repository.to_string(), tag.to_string()));
            Ok(())
        }

        async fn create_repo(&self, repository: &str) -> StagekeepResult<()> {
            self.created_repos.lock().unwrap().push(repository.to_string());
            Ok(())
        }

        async fn delete_repo(&self, repository: &str) -> StagekeepResult<()> {
            self.deleted_repos.lock().unwrap().push(repository.to_string());
            Ok(())
        }
    }

    fn owned(image: &str, commit: &str) -> Vec<(String, String)> {
        vec![
            (labels::OWNED.to_string(), "true".to_string()),
            (labels::IMAGE_NAME.to_string(), image.to_string()),
            (labels::COMMIT.to_string(), commit.to_string()),
        ]
    }

    fn owned_refs<'a>(pairs: &'a [(String, String)]) -> Vec<(&'a str, &'a str)> {
        pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[tokio::test]
    async fn multi_layout_queries_only_requested_image_paths() {
        let mut registry = FakeRegistry::new();
        let web = owned("web", "aa");
        let worker = owned("worker", "bb");
        registry.add("reg.example.com/acme", "t1", &owned_refs(&web));
        registry.add("reg.example.com/acme/web", "t2", &owned_refs(&web));
        registry.add("reg.example.com/acme/worker", "t3", &owned_refs(&worker));

        let repo = ImagesRepo::new(registry, "reg.example.com/acme", RepoLayout::Multi);
        let selected = repo
            .select_artifacts(&["web".to_string()], None)
            .await
            .unwrap();

        assert_eq!(selected["web"].len(), 1);
        assert_eq!(selected["web"][0].tag, "t2");

        let queried = repo.client.queried.lock().unwrap().clone();
        assert_eq!(queried, vec!["reg.example.com/acme/web".to_string()]);
    }

    #[tokio::test]
    async fn mono_layout_buckets_by_image_name_label() {
        let mut registry = FakeRegistry::new();
        let web = owned("web", "aa");
        let worker = owned("worker", "bb");
        registry.add("reg.example.com/acme", "t1", &owned_refs(&web));
        registry.add("reg.example.com/acme", "t2", &owned_refs(&worker));
        registry.add("reg.example.com/acme", "t3", &owned_refs(&web));

        let repo = ImagesRepo::new(registry, "reg.example.com/acme", RepoLayout::Mono);
        let selected = repo
            .select_artifacts(&["web".to_string(), "worker".to_string()], None)
            .await
            .unwrap();

        let web_tags: Vec<_> = selected["web"].iter().map(|a| a.tag.as_str()).collect();
        assert_eq!(web_tags, vec!["t1", "t3"]);
        assert_eq!(selected["worker"].len(), 1);
    }

    #[tokio::test]
    async fn unowned_and_foreign_tags_are_ignored() {
        let mut registry = FakeRegistry::new();
        let web = owned("web", "aa");
        let other = owned("other", "cc");
        registry.add("reg.example.com/acme", "kept", &owned_refs(&web));
        registry.add("reg.example.com/acme", "manual-push", &[]);
        registry.add(
            "reg.example.com/acme",
            "disowned",
            &[(labels::OWNED, "false")],
        );
        registry.add("reg.example.com/acme", "foreign", &owned_refs(&other));

        let repo = ImagesRepo::new(registry, "reg.example.com/acme", RepoLayout::Mono);
        let selected = repo
            .select_artifacts(&["web".to_string()], None)
            .await
            .unwrap();

        assert_eq!(selected["web"].len(), 1);
        assert_eq!(selected["web"][0].tag, "kept");
    }

    #[tokio::test]
    async fn predicate_filters_and_its_error_aborts() {
        let mut registry = FakeRegistry::new();
        let web = owned("web", "aa");
        registry.add("reg.example.com/acme/web", "keep", &owned_refs(&web));
        registry.add("reg.example.com/acme/web", "drop", &owned_refs(&web));

        let repo = ImagesRepo::new(registry, "reg.example.com/acme", RepoLayout::Multi);

        let keep_only: ArtifactPredicate<'_> = &|a| Ok(a.tag == "keep");
        let selected = repo
            .select_artifacts(&["web".to_string()], Some(keep_only))
            .await
            .unwrap();
        assert_eq!(selected["web"].len(), 1);
        assert_eq!(selected["web"][0].tag, "keep");

        let failing: ArtifactPredicate<'_> =
            &|a| Err(StagekeepError::registry(a.reference(), "probe failed"));
        assert!(repo
            .select_artifacts(&["web".to_string()], Some(failing))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn absent_repository_lists_empty() {
        let registry = FakeRegistry::new();
        let repo = ImagesRepo::new(registry, "reg.example.com/acme", RepoLayout::Multi);
        let selected = repo
            .select_artifacts(&["web".to_string()], None)
            .await
            .unwrap();
        assert!(selected["web"].is_empty());
    }

    #[tokio::test]
    async fn mono_and_multi_layouts_select_equivalent_mappings() {
        // One consistently-labeled artifact universe, published both ways
        let web = owned("web", "aa");
        let worker = owned("worker", "bb");
        let universe = [
            ("web", "t1", &web),
            ("worker", "t2", &worker),
            ("web", "t3", &web),
        ];

        let mut mono = FakeRegistry::new();
        let mut multi = FakeRegistry::new();
        for (image, tag, labels) in &universe {
            mono.add("reg.example.com/acme", tag, &owned_refs(labels));
            multi.add(
                &format!("reg.example.com/acme/{image}"),
                tag,
                &owned_refs(labels),
            );
        }

        let mono_repo = ImagesRepo::new(mono, "reg.example.com/acme", RepoLayout::Mono);
        let multi_repo = ImagesRepo::new(multi, "reg.example.com/acme", RepoLayout::Multi);

        let images = vec!["web".to_string(), "worker".to_string()];
        let from_mono = mono_repo.select_artifacts(&images, None).await.unwrap();
        let from_multi = multi_repo.select_artifacts(&images, None).await.unwrap();

        let tags = |selected: &HashMap<String, Vec<ArtifactInfo>>, image: &str| {
            let mut tags: Vec<String> =
                selected[image].iter().map(|a| a.tag.clone()).collect();
            tags.sort();
            tags
        };
        for image in ["web", "worker"] {
            assert_eq!(tags(&from_mono, image), tags(&from_multi, image));
        }
        assert_eq!(tags(&from_mono, "web"), vec!["t1", "t3"]);
        assert_eq!(tags(&from_mono, "worker"), vec!["t2"]);
    }

    #[tokio::test]
    async fn create_image_repo_targets_the_layout_path() {
        let repo = ImagesRepo::new(FakeRegistry::new(), "reg.example.com/acme", RepoLayout::Multi);
        repo.create_image_repo("web").await.unwrap();
        assert_eq!(
            repo.client.created_repos.lock().unwrap().clone(),
            vec!["reg.example.com/acme/web".to_string()]
        );

        let repo = ImagesRepo::new(FakeRegistry::new(), "reg.example.com/acme", RepoLayout::Mono);
        repo.create_image_repo("web").await.unwrap();
        assert_eq!(
            repo.client.created_repos.lock().unwrap().clone(),
            vec!["reg.example.com/acme".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_image_repo_mono_spares_other_images_tags() {
        let mut registry = FakeRegistry::new();
        let web = owned("web", "aa");
        let worker = owned("worker", "bb");
        registry.add("reg.example.com/acme", "w1", &owned_refs(&web));
        registry.add("reg.example.com/acme", "k1", &owned_refs(&worker));
        registry.add("reg.example.com/acme", "w2", &owned_refs(&web));

        let repo = ImagesRepo::new(registry, "reg.example.com/acme", RepoLayout::Mono);
        repo.delete_image_repo("web").await.unwrap();

        let deleted = repo.client.deleted_tags.lock().unwrap().clone();
        let deleted_tags: Vec<&str> = deleted.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(deleted_tags, vec!["w1", "w2"]);
        // The shared repository itself survives
        assert!(repo.client.deleted_repos.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_image_repo_multi_deletes_the_repo_path() {
        let repo = ImagesRepo::new(FakeRegistry::new(), "reg.example.com/acme", RepoLayout::Multi);

        // Absent repository: deletion still succeeds
        repo.delete_image_repo("web").await.unwrap();
        assert_eq!(
            repo.client.deleted_repos.lock().unwrap().clone(),
            vec!["reg.example.com/acme/web".to_string()]
        );
    }

    #[test]
    fn auto_mode_resolves_to_multi() {
        assert_eq!(RepoLayout::resolve(RepoMode::Auto), RepoLayout::Multi);
        assert_eq!(RepoLayout::resolve(RepoMode::Mono), RepoLayout::Mono);
        assert_eq!(RepoLayout::resolve(RepoMode::Multi), RepoLayout::Multi);
    }
}
