//! Configuration schema for stagekeep
//!
//! Configuration is stored at `~/.config/stagekeep/config.toml`

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project identity
    pub project: ProjectConfig,

    /// Git repository settings
    pub git: GitConfig,

    /// Image registry settings
    pub registry: RegistryConfig,

    /// Reference retention policy
    pub retention: RetentionConfig,

    /// Lock settings
    pub lock: LockConfig,
}

/// Project identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name, used in repo naming and temp dir scoping
    pub name: String,

    /// Logical image names built by this project
    pub images: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            images: vec![],
        }
    }
}

/// Git repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Remote repository url
    pub url: String,

    /// Upstream remote name whose branches are scanned
    pub upstream: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            upstream: "origin".to_string(),
        }
    }
}

/// How image names map onto physical registry repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoMode {
    /// One shared repository; images distinguished by label
    Mono,
    /// One repository per image name
    Multi,
    /// Resolve at repo construction (currently multi)
    Auto,
}

/// Image registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry api endpoint, e.g. `https://registry.example.com`
    pub endpoint: String,

    /// Images repo address below the endpoint, e.g. `acme/myproject`
    pub address: String,

    /// Repository layout mode
    pub mode: RepoMode,

    /// Optional bearer token for registry requests
    pub token: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            address: String::new(),
            mode: RepoMode::Auto,
            token: None,
        }
    }
}

/// Reference retention policy knobs. Zero/absent means "no limit"; the
/// defaults match the base policy (all origin branches, all tags).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Drop references whose tip committer time is older than this many days
    pub period_days: Option<u32>,

    /// Keep at most this many branches (newest first)
    pub branch_limit: Option<usize>,

    /// Keep at most this many tags (newest first)
    pub tag_limit: Option<usize>,
}

/// Lock settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Timeout in seconds for blocking whole-phase locks
    pub timeout_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { timeout_secs: 600 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.git.upstream, "origin");
        assert_eq!(config.registry.mode, RepoMode::Auto);
        assert_eq!(config.lock.timeout_secs, 600);
        assert!(config.retention.period_days.is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [project]
            name = "shop"
            images = ["web", "worker"]

            [registry]
            endpoint = "https://registry.example.com"
            address = "acme/shop"
            mode = "mono"
            "#,
        )
        .unwrap();

        assert_eq!(config.project.name, "shop");
        assert_eq!(config.project.images, vec!["web", "worker"]);
        assert_eq!(config.registry.mode, RepoMode::Mono);
        assert_eq!(config.git.upstream, "origin");
    }

    #[test]
    fn retention_limits_parse() {
        let config: Config = toml::from_str(
            r#"
            [retention]
            period_days = 90
            branch_limit = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.retention.period_days, Some(90));
        assert_eq!(config.retention.branch_limit, Some(10));
        assert_eq!(config.retention.tag_limit, None);
    }

    #[test]
    fn config_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.lock.timeout_secs, config.lock.timeout_secs);
    }
}
