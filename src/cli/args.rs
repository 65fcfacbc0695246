//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Stagekeep - registry and host cleanup for stage-built images
///
/// Removes published image artifacts no longer reachable from retained git
/// references, and sweeps leftover build containers, dangling images, and
/// temp garbage from the local host.
#[derive(Parser, Debug)]
#[command(name = "stagekeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STAGEKEEP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Remove unreachable image artifacts from the registry
    Cleanup(CleanupArgs),

    /// Sweep leftover containers, images, and temp garbage from this host
    HostCleanup(HostCleanupArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the cleanup command
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Report what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the host-cleanup command
#[derive(Parser, Debug)]
pub struct HostCleanupArgs {
    /// Report what would be removed without removing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommand actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}
