//! Dashboard read model
//!
//! After an event is processed the orchestrator builds a [`DashboardView`]
//! and hands it to the configured [`DashboardProjector`].

mod projector;
mod types;

pub use projector::{DashboardProjector, InMemoryProjector};
pub use types::*;
