//! Configuration management for stagekeep

pub mod schema;

pub use schema::{Config, RegistryConfig, RepoMode};

use crate::error::{StagekeepError, StagekeepResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Version token for the work-tree cache layout. Bumping it makes older,
/// incompatible cache dirs invisible to this binary; they get collected as
/// temp garbage instead of being misread.
pub const WORKTREE_CACHE_VERSION: &str = "2";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path in use
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagekeep")
            .join("config.toml")
    }

    /// Root of the local content cache (clones, work trees)
    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagekeep")
    }

    /// Directory holding bare clones of remote repositories
    pub fn git_repos_dir() -> PathBuf {
        Self::cache_dir().join("git_repos")
    }

    /// Root holding every work-tree cache version
    pub fn worktrees_root() -> PathBuf {
        Self::cache_dir().join("git_worktrees")
    }

    /// Versioned directory holding cached work trees
    pub fn worktrees_dir() -> PathBuf {
        Self::worktrees_root().join(WORKTREE_CACHE_VERSION)
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagekeep")
    }

    /// Directory holding advisory lock files
    pub fn locks_dir() -> PathBuf {
        Self::state_dir().join("locks")
    }

    /// Directory holding temp resources subject to gc
    pub fn tmp_dir() -> PathBuf {
        Self::state_dir().join("tmp")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> StagekeepResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> StagekeepResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StagekeepError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| StagekeepError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Ensure all state directories exist
    pub async fn ensure_state_dirs() -> StagekeepResult<()> {
        let dirs = [
            Self::state_dir(),
            Self::locks_dir(),
            Self::tmp_dir(),
            Self::git_repos_dir(),
            Self::worktrees_dir(),
        ];

        for dir in &dirs {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StagekeepError::DirCreate {
                    path: dir.clone(),
                    source: e,
                })?;
        }

        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
