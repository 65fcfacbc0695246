//! Registry HTTP API v2 client
//!
//! Talks the distribution API directly: tag listing, manifest and config
//! blob reads for labels, and deletion by manifest digest. Absent tags and
//! repositories are treated as already deleted.

use crate::config::RegistryConfig;
use crate::error::{StagekeepError, StagekeepResult};
use crate::registry::RegistryClient;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const MANIFEST_MEDIA_TYPES: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

const DIGEST_HEADER: &str = "Docker-Content-Digest";

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ManifestResponse {
    config: ManifestConfig,
}

#[derive(Debug, Deserialize)]
struct ManifestConfig {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct ConfigBlob {
    #[serde(default)]
    config: Option<ConfigSection>,
}

#[derive(Debug, Deserialize)]
struct ConfigSection {
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

/// Distribution API v2 client for one registry endpoint
pub struct HttpRegistryClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRegistryClient {
    /// Build a client for the configured registry. The endpoint keeps its
    /// scheme; a bearer token, when configured, is sent on every request.
    pub fn new(config: &RegistryConfig) -> StagekeepResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                StagekeepError::registry(&config.endpoint, "registry token is not a valid header")
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("stagekeep/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| StagekeepError::registry(&config.endpoint, e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, repository: &str, suffix: &str) -> String {
        // Repository paths arrive with the registry host prefix; the API
        // path wants only the name component.
        let name = repository
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(repository);
        format!("{}/v2/{}/{}", self.endpoint, name, suffix)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        reference: &str,
    ) -> StagekeepResult<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| StagekeepError::registry(reference, e.to_string()))
    }

    fn unexpected(reference: &str, response: &reqwest::Response) -> StagekeepError {
        StagekeepError::registry(
            reference,
            format!("unexpected status {}", response.status()),
        )
    }

    async fn manifest_digest(
        &self,
        repository: &str,
        tag: &str,
    ) -> StagekeepResult<Option<String>> {
        let reference = format!("{repository}:{tag}");
        let request = self
            .client
            .head(self.url(repository, &format!("manifests/{tag}")))
            .header(ACCEPT, MANIFEST_MEDIA_TYPES);
        let response = self.send(request, &reference).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let digest = response
                    .headers()
                    .get(DIGEST_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        StagekeepError::registry(&reference, "response lacks a content digest")
                    })?;
                Ok(Some(digest))
            }
            _ => Err(Self::unexpected(&reference, &response)),
        }
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn tags(&self, repository: &str) -> StagekeepResult<Vec<String>> {
        let request = self.client.get(self.url(repository, "tags/list"));
        let response = self.send(request, repository).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let body: TagsResponse = response
                    .json()
                    .await
                    .map_err(|e| StagekeepError::registry(repository, e.to_string()))?;
                Ok(body.tags.unwrap_or_default())
            }
            _ => Err(Self::unexpected(repository, &response)),
        }
    }

    async fn tag_labels(
        &self,
        repository: &str,
        tag: &str,
    ) -> StagekeepResult<HashMap<String, String>> {
        let reference = format!("{repository}:{tag}");

        let request = self
            .client
            .get(self.url(repository, &format!("manifests/{tag}")))
            .header(ACCEPT, MANIFEST_MEDIA_TYPES);
        let response = self.send(request, &reference).await?;
        if !response.status().is_success() {
            return Err(Self::unexpected(&reference, &response));
        }
        let manifest: ManifestResponse = response
            .json()
            .await
            .map_err(|e| StagekeepError::registry(&reference, e.to_string()))?;

        let request = self
            .client
            .get(self.url(repository, &format!("blobs/{}", manifest.config.digest)));
        let response = self.send(request, &reference).await?;
        if !response.status().is_success() {
            return Err(Self::unexpected(&reference, &response));
        }
        let blob: ConfigBlob = response
            .json()
            .await
            .map_err(|e| StagekeepError::registry(&reference, e.to_string()))?;

        Ok(blob.config.and_then(|c| c.labels).unwrap_or_default())
    }

    async fn delete_tag(&self, repository: &str, tag: &str) -> StagekeepResult<()> {
        let reference = format!("{repository}:{tag}");

        let Some(digest) = self.manifest_digest(repository, tag).await? else {
            debug!("Tag {} already absent", reference);
            return Ok(());
        };

        let request = self
            .client
            .delete(self.url(repository, &format!("manifests/{digest}")));
        let response = self.send(request, &reference).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => Err(Self::unexpected(&reference, &response)),
        }
    }

    async fn create_repo(&self, repository: &str) -> StagekeepResult<()> {
        // The distribution API creates repositories implicitly on first
        // push; nothing to do up front.
        debug!("Repository {} will be created on first push", repository);
        Ok(())
    }

    async fn delete_repo(&self, repository: &str) -> StagekeepResult<()> {
        for tag in self.tags(repository).await? {
            self.delete_tag(repository, &tag).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> HttpRegistryClient {
        HttpRegistryClient::new(&RegistryConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn url_strips_registry_host_from_repository_path() {
        let c = client("https://reg.example.com");
        assert_eq!(
            c.url("reg.example.com/acme/web", "tags/list"),
            "https://reg.example.com/v2/acme/web/tags/list"
        );
    }

    #[test]
    fn url_accepts_bare_repository_name() {
        let c = client("https://reg.example.com/");
        assert_eq!(
            c.url("acme", "manifests/latest"),
            "https://reg.example.com/v2/acme/manifests/latest"
        );
    }

    #[test]
    fn config_blob_labels_parse() {
        let blob: ConfigBlob = serde_json::from_str(
            r#"{"config":{"Labels":{"io.stagekeep.owned":"true"}}}"#,
        )
        .unwrap();
        let labels = blob.config.and_then(|c| c.labels).unwrap();
        assert_eq!(labels["io.stagekeep.owned"], "true");
    }

    #[test]
    fn config_blob_without_labels_is_empty() {
        let blob: ConfigBlob = serde_json::from_str(r#"{"config":{}}"#).unwrap();
        assert!(blob.config.and_then(|c| c.labels).is_none());

        let blob: ConfigBlob = serde_json::from_str(r#"{}"#).unwrap();
        assert!(blob.config.is_none());
    }

    #[test]
    fn invalid_token_is_rejected() {
        let result = HttpRegistryClient::new(&RegistryConfig {
            endpoint: "https://reg.example.com".to_string(),
            token: Some("bad\ntoken".to_string()),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
