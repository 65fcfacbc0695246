//! Remote repository endpoint parsing
//!
//! A parsed endpoint keys the on-disk clone and work-tree cache locations,
//! so two urls that point at the same repository through the same transport
//! share one cache entry.

use crate::error::{StagekeepError, StagekeepResult};
use std::path::PathBuf;

/// Parsed remote repository location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Transport scheme (`https`, `ssh`, `git`, `file`)
    pub scheme: String,
    /// Host name, empty for local paths
    pub host: String,
    /// Optional port
    pub port: Option<u16>,
    /// Repository path on the host
    pub path: String,
}

impl Endpoint {
    /// Parse a repository url.
    ///
    /// Accepts `scheme://[user@]host[:port]/path`, scp-like
    /// `user@host:path`, and absolute local paths.
    pub fn parse(url: &str) -> StagekeepResult<Self> {
        let bad = |reason: &str| StagekeepError::BadRepoUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        if url.is_empty() {
            return Err(bad("empty url"));
        }

        if let Some((scheme, rest)) = url.split_once("://") {
            if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
                return Err(bad("bad scheme"));
            }
            let (authority, path) = match rest.split_once('/') {
                Some((a, p)) => (a, format!("/{p}")),
                None => (rest, String::new()),
            };
            // Strip user info
            let hostport = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
            let (host, port) = match hostport.rsplit_once(':') {
                Some((h, p)) => {
                    let port: u16 = p.parse().map_err(|_| bad("bad port"))?;
                    (h, Some(port))
                }
                None => (hostport, None),
            };
            if host.is_empty() {
                return Err(bad("no host"));
            }
            return Ok(Self {
                scheme: scheme.to_string(),
                host: host.to_string(),
                port,
                path,
            });
        }

        // scp-like: user@host:path
        if let Some((userhost, path)) = url.split_once(':') {
            if let Some((_, host)) = userhost.split_once('@') {
                if host.is_empty() || path.is_empty() {
                    return Err(bad("bad scp-like url"));
                }
                return Ok(Self {
                    scheme: "ssh".to_string(),
                    host: host.to_string(),
                    port: None,
                    path: path.to_string(),
                });
            }
        }

        // Local path
        if url.starts_with('/') || url.starts_with("./") || url.starts_with("../") {
            return Ok(Self {
                scheme: "file".to_string(),
                host: "localhost".to_string(),
                port: None,
                path: url.to_string(),
            });
        }

        Err(bad("unrecognized url form"))
    }

    /// Filesystem-relative cache key: `protocol-<scheme>/<host[:port]>/<path>`
    pub fn cache_relative_path(&self) -> PathBuf {
        let host = match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        };
        let path = self.path.trim_start_matches('/');
        PathBuf::from(format!("protocol-{}", self.scheme))
            .join(host)
            .join(path)
    }
}
