//! Podman-backed container runtime
//!
//! Shells out to the `podman` CLI and parses its JSON output. Rootless
//! Podman works as-is; nothing here needs elevated privileges.

use crate::error::{StagekeepError, StagekeepResult};
use crate::runtime::{ContainerInfo, ContainerRuntime, ImageInfo, RemovalFailure};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Container runtime using the Podman CLI
pub struct PodmanRuntime;

#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Names", default)]
    names: Vec<String>,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

impl PodmanRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Execute a Podman command and return the output
    async fn exec(&self, args: &[&str]) -> StagekeepResult<std::process::Output> {
        debug!("Executing: podman {:?}", args);

        Command::new("podman")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| StagekeepError::command_failed(format!("podman {:?}", args), e))
    }

    /// Execute and require success, returning stdout
    async fn exec_checked(&self, args: &[&str]) -> StagekeepResult<String> {
        let output = self.exec(args).await?;
        if !output.status.success() {
            return Err(StagekeepError::command_exec(
                format!("podman {:?}", args),
                String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Remove a batch one id at a time, collecting per-item failures.
    /// "No such" errors count as success so removals are idempotent.
    async fn remove_each(&self, subcommand: &str, ids: &[String], force: bool) -> Vec<RemovalFailure> {
        let mut failures = Vec::new();

        for id in ids {
            let mut args = vec![subcommand, "rm"];
            if force {
                args.push("-f");
            }
            args.push(id);

            match self.exec(&args).await {
                Ok(output) if output.status.success() => {}
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                    if stderr.to_lowercase().contains("no such") {
                        debug!("{} {} already gone", subcommand, id);
                    } else {
                        warn!("Failed to remove {} {}: {}", subcommand, id, stderr.trim());
                        failures.push(RemovalFailure {
                            id: id.clone(),
                            reason: stderr.trim().to_string(),
                        });
                    }
                }
                Err(e) => failures.push(RemovalFailure {
                    id: id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        failures
    }
}

impl Default for PodmanRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_containers(json: &str, name_prefix: &str) -> StagekeepResult<Vec<ContainerInfo>> {
    let entries: Vec<PsEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|e| ContainerInfo {
            id: e.id,
            names: e.names,
            image: e.image,
            labels: e.labels.unwrap_or_default(),
        })
        .filter(|c| c.name_with_prefix(name_prefix).is_some())
        .collect())
}

fn parse_images(json: &str) -> StagekeepResult<Vec<ImageInfo>> {
    let entries: Vec<ImageEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|e| ImageInfo {
            id: e.id,
            labels: e.labels.unwrap_or_default(),
        })
        .collect())
}

#[async_trait]
impl ContainerRuntime for PodmanRuntime {
    async fn list_containers(&self, name_prefix: &str) -> StagekeepResult<Vec<ContainerInfo>> {
        let stdout = self
            .exec_checked(&["ps", "-a", "--format", "json"])
            .await?;
        parse_containers(&stdout, name_prefix)
    }

    async fn list_dangling_images(&self) -> StagekeepResult<Vec<ImageInfo>> {
        let stdout = self
            .exec_checked(&["images", "--filter", "dangling=true", "--format", "json"])
            .await?;
        parse_images(&stdout)
    }

    async fn image_in_use(&self, image_id: &str) -> StagekeepResult<bool> {
        let filter = format!("ancestor={image_id}");
        let stdout = self
            .exec_checked(&["ps", "-a", "--filter", &filter, "--format", "json"])
            .await?;
        let entries: Vec<PsEntry> = serde_json::from_str(&stdout)?;
        Ok(!entries.is_empty())
    }

    async fn remove_containers(&self, ids: &[String], force: bool) -> Vec<RemovalFailure> {
        self.remove_each("container", ids, force).await
    }

    async fn remove_images(&self, ids: &[String]) -> Vec<RemovalFailure> {
        self.remove_each("image", ids, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_containers_filters_by_name_prefix() {
        let json = r#"[
            {"Id":"aaa","Names":["stagekeep-stage-build-x"],"Image":"img1",
             "Labels":{"io.stagekeep.owned":"true"}},
            {"Id":"bbb","Names":["unrelated"],"Image":"img2","Labels":null}
        ]"#;

        let containers = parse_containers(json, "stagekeep-stage-build-").unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "aaa");
        assert_eq!(containers[0].labels["io.stagekeep.owned"], "true");
    }

    #[test]
    fn parse_containers_tolerates_missing_fields() {
        let json = r#"[{"Id":"ccc"}]"#;
        let containers = parse_containers(json, "").unwrap();
        // No names at all means no name carries any prefix
        assert!(containers.is_empty());
    }

    #[test]
    fn parse_images_with_null_labels() {
        let json = r#"[
            {"Id":"sha256:111","Labels":{"io.stagekeep.owned":"true"}},
            {"Id":"sha256:222","Labels":null}
        ]"#;

        let images = parse_images(json).unwrap();
        assert_eq!(images.len(), 2);
        assert!(images[1].labels.is_empty());
    }

    #[test]
    fn parse_rejects_malformed_json() {
        assert!(parse_images("not json").is_err());
        assert!(parse_containers("{}", "").is_err());
    }
}
