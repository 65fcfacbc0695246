//! Error types for stagekeep
//!
//! All modules use `StagekeepResult<T>` as their return type. Per-artifact
//! removal failures are not errors; they are collected into sweep/cleanup
//! reports and surfaced there.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stagekeep operations
pub type StagekeepResult<T> = Result<T, StagekeepError>;

/// All errors that can occur in stagekeep
#[derive(Error, Debug)]
pub enum StagekeepError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create directory {path}: {source}")]
    DirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Git repository errors
    #[error("Bad repository url '{url}': {reason}")]
    BadRepoUrl { url: String, reason: String },

    #[error("Git operation failed: {context}: {source}")]
    Git {
        context: String,
        #[source]
        source: git2::Error,
    },

    #[error("Cannot read commit {commit}: {source}")]
    CommitRead {
        commit: String,
        #[source]
        source: git2::Error,
    },

    // Lock errors
    #[error("Timed out acquiring lock '{name}' after {seconds}s")]
    LockTimeout { name: String, seconds: u64 },

    #[error("Lock '{name}' failed: {source}")]
    Lock {
        name: String,
        #[source]
        source: std::io::Error,
    },

    // Registry errors
    #[error("Registry request failed for '{reference}': {reason}")]
    Registry { reference: String, reason: String },

    // Container runtime errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl StagekeepError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a git error with operation context
    pub fn git(context: impl Into<String>, source: git2::Error) -> Self {
        Self::Git {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a registry error for a reference
    pub fn registry(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Registry {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LockTimeout { .. } => {
                Some("Another stagekeep process may be stuck; check for stale processes")
            }
            Self::BadRepoUrl { .. } => {
                Some("Expected scheme://host[:port]/path or user@host:path")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StagekeepError::LockTimeout {
            name: "host-cleanup".to_string(),
            seconds: 600,
        };
        assert!(err.to_string().contains("host-cleanup"));
        assert!(err.to_string().contains("600"));
    }

    #[test]
    fn error_hint() {
        let err = StagekeepError::BadRepoUrl {
            url: "::".to_string(),
            reason: "no host".to_string(),
        };
        assert!(err.hint().is_some());
        assert!(StagekeepError::User("x".to_string()).hint().is_none());
    }

    #[test]
    fn io_constructor_keeps_context() {
        let err = StagekeepError::io(
            "reading lock dir",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("reading lock dir"));
    }
}
