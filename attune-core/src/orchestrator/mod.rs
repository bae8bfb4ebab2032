//! Orchestrator
//!
//! Owns the lifecycle state machine, routes events to handlers, keeps
//! unified statistics and runs the monitoring and optimization loops.
//!
//! ```text
//! INITIALIZING ──setup ok──► READY ──first event──► RUNNING
//!      │                      │  ▲                     │
//!   setup fails          optimize│                     │ error rate
//!      ▼                      ▼  │                     ▼
//!    ERROR ──setup retried──► MAINTENANCE ──health ok──► READY
//! ```

mod handlers;
mod health;
mod runtime;
mod state;
mod stats;
mod ticker;

pub use health::{
    Capability, CollaboratorHealth, ComponentHealth, Components, HealthReport, HealthStatus,
};
pub use runtime::{OptimizationReport, Orchestrator, OrchestratorBuilder};
pub use state::{OrchestratorState, StateMachine, StateTransition};
pub use stats::{Statistics, StatisticsSnapshot};
pub use ticker::{TickFn, Tickers};
