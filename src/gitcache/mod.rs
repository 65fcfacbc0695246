//! Local cache of remote git repositories
//!
//! Bare mirrors live under the content-cache root keyed by parsed endpoint;
//! work-tree cache entries live under a versioned root with the same key.

pub mod endpoint;
pub mod remote;

pub use endpoint::Endpoint;
pub use remote::{RemoteGitRepo, RepoCommitGraph};
