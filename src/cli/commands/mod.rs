//! CLI command implementations

pub mod cleanup;
pub mod config;
pub mod host_cleanup;

pub use cleanup::execute as cleanup;
pub use config::execute as config;
pub use host_cleanup::execute as host_cleanup;
