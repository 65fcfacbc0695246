//! Stagekeep - registry and host cleanup for stage-built images
//!
//! Deletes published image artifacts whose source commits are no longer
//! reachable from retained git references, and sweeps leftover build
//! containers, dangling images, and temp garbage from the local host.

pub mod cli;
pub mod config;
pub mod error;
pub mod gitcache;
pub mod lock;
pub mod registry;
pub mod runtime;
pub mod scan;
pub mod sweep;
pub mod ui;

pub use error::{StagekeepError, StagekeepResult};
