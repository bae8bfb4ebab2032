pub mod config;
pub mod replay;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use attune_core::{
    AttuneConfig, InMemoryGateway, InMemoryProjector, JsonlGateway, Orchestrator,
    PersistenceGateway,
};

/// Build an orchestrator with the built-in analyzers and an in-memory dashboard.
///
/// With a data directory, sessions and profiles are stored as JSON lines there;
/// otherwise they live in memory for the lifetime of the process.
pub async fn build_orchestrator(
    config: AttuneConfig,
    data_dir: Option<&Path>,
    background_tasks: bool,
) -> Orchestrator {
    let gateway: Arc<dyn PersistenceGateway> = match data_dir {
        Some(dir) => Arc::new(JsonlGateway::new(dir)),
        None => Arc::new(InMemoryGateway::new()),
    };

    Orchestrator::builder(config)
        .with_builtin_analyzers()
        .with_gateway(gateway)
        .with_projector(Arc::new(InMemoryProjector::new()))
        .with_background_tasks(background_tasks)
        .build()
        .await
}
