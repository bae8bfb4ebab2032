use std::path::PathBuf;

use anyhow::Result;
use attune_observe::{LogFormat, init_logging};
use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "attune", about = "Adaptive orchestration for therapeutic game sessions")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of the user and project layers
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON lines file of events through the orchestrator
    Replay(commands::replay::ReplayArgs),
    /// Process JSON events from stdin until EOF or Ctrl-C
    Run(commands::run::RunArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if cli.verbose {
        config.logging = config.logging.with_level("debug");
    }
    if cli.log_json {
        config.logging = config.logging.with_format(LogFormat::Json);
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Replay(args) => commands::replay::run(args, config).await,
        Commands::Run(args) => commands::run::run(args, config).await,
        Commands::Config(args) => commands::config::run(args, &config, cli.config.as_deref()),
    }
}
