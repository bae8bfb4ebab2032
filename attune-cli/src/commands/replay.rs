use std::path::PathBuf;

use anyhow::{Context, Result};
use attune_core::{AttuneConfig, Event, EventResponse, Orchestrator};
use clap::Args;
use tracing::warn;

use super::build_orchestrator;

#[derive(Args)]
pub struct ReplayArgs {
    /// JSON lines file with one `{type, data, timestamp}` event per line
    pub file: PathBuf,

    /// Print every response as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Store sessions and profiles as JSON lines under this directory
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Counts for one replay.
#[derive(Debug, Default, PartialEq)]
pub struct ReplaySummary {
    pub events: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Lines that did not parse as an event.
    pub skipped: usize,
}

pub async fn run(args: ReplayArgs, config: AttuneConfig) -> Result<()> {
    let contents = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let orchestrator = build_orchestrator(config, args.data_dir.as_deref(), false).await;
    orchestrator.initialize().await?;

    let json = args.json;
    let summary = replay(&orchestrator, &contents, |line, event, response| {
        if json {
            match serde_json::to_string(response) {
                Ok(out) => println!("{out}"),
                Err(e) => warn!(line, error = %e, "Failed to render response"),
            }
        } else {
            let outcome = match &response.error {
                None => "ok".to_string(),
                Some(error) => format!("failed: {error}"),
            };
            println!(
                "{:>5}  {:<26} {:>8.2} ms  {}",
                line,
                event.event_type.as_str(),
                response.response_time,
                outcome
            );
        }
    })
    .await;

    if !json {
        let stats = orchestrator.get_unified_statistics().await;
        println!();
        println!(
            "Replayed {} events: {} succeeded, {} failed, {} skipped",
            summary.events, summary.succeeded, summary.failed, summary.skipped
        );
        println!(
            "State: {}  Health: {:?} ({}/{})  Avg response: {:.2} ms",
            stats.state,
            stats.system_health.status,
            stats.system_health.active_components,
            stats.system_health.total_components,
            stats.average_response_time
        );
    }

    orchestrator.shutdown().await;
    Ok(())
}

/// Feed every line of `contents` to the orchestrator in order.
pub async fn replay<F>(orchestrator: &Orchestrator, contents: &str, mut on_response: F) -> ReplaySummary
where
    F: FnMut(usize, &Event, &EventResponse),
{
    let mut summary = ReplaySummary::default();

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: Event = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping line that is not an event");
                summary.skipped += 1;
                continue;
            }
        };

        let response = orchestrator.process_event(event.clone()).await;
        summary.events += 1;
        if response.success {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
        }
        on_response(line_no, &event, &response);
    }

    summary
}
