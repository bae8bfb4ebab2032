use std::path::Path;

use anyhow::Result;
use attune_core::AttuneConfig;
use clap::{Args, Subcommand};

use crate::config::ConfigLoader;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged)
    Show,
    /// Show configuration file paths
    Path,
}

pub fn run(args: ConfigArgs, config: &AttuneConfig, explicit: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(config),
        ConfigCommands::Path => show_paths(explicit),
    }
}

fn show_config(config: &AttuneConfig) -> Result<()> {
    println!("{}", config.to_toml()?);
    Ok(())
}

fn show_paths(explicit: Option<&Path>) -> Result<()> {
    if let Some(path) = explicit {
        println!("Config file:    {}", path.display());
        return Ok(());
    }
    println!("User config:    {:?}", ConfigLoader::user_config_path());
    println!("Project config: {:?}", ConfigLoader::project_config_path());
    Ok(())
}
