//! attune-core: adaptive orchestration and difficulty scheduling
//!
//! This crate provides the engine behind attune:
//!
//! - **Orchestrator** - [`Orchestrator`] routes [`Event`]s, tracks lifecycle state and health
//! - **Metrics** - [`MetricsAggregator`] maps session payloads into metric categories
//! - **Analyzers** - [`AnalyzerRegistry`] runs pluggable [`Analyzer`]s with fault isolation
//! - **Difficulty** - [`AdaptiveDifficultyEngine`] keeps per-activity tiers with hysteresis
//! - **Retention** - [`RetentionScheduler`] schedules reviews on personalized forgetting curves
//! - **Collaborators** - [`PersistenceGateway`] and [`DashboardProjector`] contracts
//!
//! # Quick Start
//!
//! ```no_run
//! use attune_core::{AttuneConfig, Event, Orchestrator};
//! use serde_json::json;
//!
//! # async fn example() -> attune_core::Result<()> {
//! let orchestrator = Orchestrator::builder(AttuneConfig::default())
//!     .with_builtin_analyzers()
//!     .build()
//!     .await;
//! orchestrator.initialize().await?;
//!
//! let response = orchestrator
//!     .process_event(Event::new(
//!         "game_end",
//!         json!({"userId": "u1", "activityId": "memory-match", "performance": {"accuracy": 0.8}}),
//!     ))
//!     .await;
//! assert!(response.success);
//!
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod analyzers;
pub mod config;
pub mod dashboard;
pub mod difficulty;
pub mod error;
pub mod events;
pub(crate) mod keyed;
pub mod metrics;
pub mod orchestrator;
pub mod persistence;
pub mod retention;

// Re-export key types for convenience
pub use analyzers::{
    AnalysisReport, Analyzer, AnalyzerRegistry, AnalyzerResult, EngagementAnalyzer,
    SensoryRegulationAnalyzer,
};
pub use config::{
    AnalyzerConfig, AttuneConfig, DashboardConfig, DifficultyConfig, OrchestratorConfig,
    PersistenceConfig, RetentionConfig,
};
pub use dashboard::{DashboardProjector, DashboardView, InMemoryProjector};
pub use difficulty::{AdaptiveDifficultyEngine, DifficultyDecision, DifficultyTier, PerformanceRecord};
pub use error::{
    AnalyzerError, AttuneError, GatewayError, PersistenceError, Result, StateError,
    ValidationError,
};
pub use events::{Event, EventResponse, EventTag, ReviewInput, SessionData};
pub use metrics::{MetricsAggregator, SessionMetrics};
pub use orchestrator::{
    Capability, HealthReport, HealthStatus, OptimizationReport, Orchestrator, OrchestratorBuilder,
    OrchestratorState, StateTransition, StatisticsSnapshot,
};
pub use persistence::{
    AnalysisRecord, InMemoryGateway, JsonlGateway, Persistence, PersistenceGateway, RetryPolicy,
    SessionRecord,
};
pub use retention::{ForgettingCurve, RetentionProfile, RetentionScheduler, ReviewPlan};
