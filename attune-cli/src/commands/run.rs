use std::path::PathBuf;

use anyhow::Result;
use attune_core::{AttuneConfig, Event, EventResponse};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::build_orchestrator;

#[derive(Args)]
pub struct RunArgs {
    /// Store sessions and profiles as JSON lines under this directory
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

pub async fn run(args: RunArgs, config: AttuneConfig) -> Result<()> {
    let orchestrator = build_orchestrator(config, args.data_dir.as_deref(), true).await;
    orchestrator.initialize().await?;
    info!("Reading events from stdin, Ctrl-C to stop");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = match serde_json::from_str::<Event>(&line) {
                    Ok(event) => orchestrator.process_event(event).await,
                    Err(e) => {
                        warn!(error = %e, "Input is not an event");
                        EventResponse::failed(format!("Invalid event: {e}"), 0.0)
                    }
                };
                println!("{}", serde_json::to_string(&response)?);
            }
        }
    }

    let stats = orchestrator.get_unified_statistics().await;
    info!(
        events = stats.total_events,
        errors = stats.total_errors,
        state = %stats.state,
        "Stopping"
    );
    orchestrator.shutdown().await;
    Ok(())
}
