//! Stagekeep CLI entry point

use clap::Parser;
use console::style;
use stagekeep::cli::{Cli, Commands};
use stagekeep::config::ConfigManager;
use stagekeep::error::StagekeepResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StagekeepResult<()> {
    let cli = Cli::parse();

    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("stagekeep=warn"),
        1 => EnvFilter::new("stagekeep=info"),
        _ => EnvFilter::new("stagekeep=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = manager.load().await?;

    ConfigManager::ensure_state_dirs().await?;

    match cli.command {
        Commands::Cleanup(args) => stagekeep::cli::commands::cleanup(args, &config).await,
        Commands::HostCleanup(args) => stagekeep::cli::commands::host_cleanup(args, &config).await,
        Commands::Config(args) => stagekeep::cli::commands::config(args, &config, &manager),
    }
}
