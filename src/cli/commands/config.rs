//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::StagekeepResult;

/// Execute the config command
pub fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> StagekeepResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.config_path().display()),
    }
    Ok(())
}

fn show_config(config: &Config) -> StagekeepResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
