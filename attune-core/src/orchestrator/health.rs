//! Typed component slots and health scoring

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::OrchestratorState;
use crate::analyzers::AnalyzerRegistry;
use crate::config::OrchestratorConfig;
use crate::dashboard::DashboardProjector;
use crate::difficulty::AdaptiveDifficultyEngine;
use crate::metrics::MetricsAggregator;
use crate::persistence::Persistence;
use crate::retention::RetentionScheduler;

/// The closed set of subsystems the orchestrator composes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Metrics,
    Analyzers,
    Difficulty,
    Retention,
    Persistence,
    Dashboard,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Self::Metrics,
        Self::Analyzers,
        Self::Difficulty,
        Self::Retention,
        Self::Persistence,
        Self::Dashboard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Analyzers => "analyzers",
            Self::Difficulty => "difficulty",
            Self::Retention => "retention",
            Self::Persistence => "persistence",
            Self::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One optional slot per capability.
#[derive(Default)]
pub struct Components {
    pub metrics: Option<MetricsAggregator>,
    pub analyzers: Option<Arc<AnalyzerRegistry>>,
    pub difficulty: Option<Arc<AdaptiveDifficultyEngine>>,
    pub retention: Option<Arc<RetentionScheduler>>,
    pub persistence: Option<Persistence>,
    pub dashboard: Option<Arc<dyn DashboardProjector>>,
}

impl Components {
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Metrics => self.metrics.is_some(),
            Capability::Analyzers => self.analyzers.is_some(),
            Capability::Difficulty => self.difficulty.is_some(),
            Capability::Retention => self.retention.is_some(),
            Capability::Persistence => self.persistence.is_some(),
            Capability::Dashboard => self.dashboard.is_some(),
        }
    }

    /// Clear a slot.
    pub fn remove(&mut self, capability: Capability) {
        match capability {
            Capability::Metrics => self.metrics = None,
            Capability::Analyzers => self.analyzers = None,
            Capability::Difficulty => self.difficulty = None,
            Capability::Retention => self.retention = None,
            Capability::Persistence => self.persistence = None,
            Capability::Dashboard => self.dashboard = None,
        }
    }
}

/// Outcome of the most recent call to each external collaborator.
#[derive(Debug)]
pub struct CollaboratorHealth {
    persistence: AtomicBool,
    dashboard: AtomicBool,
}

impl Default for CollaboratorHealth {
    fn default() -> Self {
        Self {
            persistence: AtomicBool::new(true),
            dashboard: AtomicBool::new(true),
        }
    }
}

impl CollaboratorHealth {
    pub fn set_persistence(&self, ok: bool) {
        self.persistence.store(ok, Ordering::Relaxed);
    }

    pub fn set_dashboard(&self, ok: bool) {
        self.dashboard.store(ok, Ordering::Relaxed);
    }

    pub fn persistence(&self) -> bool {
        self.persistence.load(Ordering::Relaxed)
    }

    pub fn dashboard(&self) -> bool {
        self.dashboard.load(Ordering::Relaxed)
    }
}

/// Health category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: f64, config: &OrchestratorConfig) -> Self {
        if score >= config.healthy_threshold {
            Self::Healthy
        } else if score >= config.warning_threshold {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

/// Health of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub capability: Capability,
    pub configured: bool,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Health snapshot. `score = active / total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub state: OrchestratorState,
    pub score: f64,
    pub status: HealthStatus,
    pub active_components: usize,
    pub total_components: usize,
    pub components: Vec<ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub async fn evaluate(
        components: &Components,
        collaborators: &CollaboratorHealth,
        config: &OrchestratorConfig,
        state: OrchestratorState,
    ) -> Self {
        let mut entries = Vec::with_capacity(Capability::ALL.len());

        for capability in Capability::ALL {
            let configured = components.has(capability);
            let (active, detail) = if !configured {
                (false, Some("not configured".to_string()))
            } else {
                match capability {
                    Capability::Analyzers => match &components.analyzers {
                        Some(registry) => {
                            let total = registry.len().await;
                            let active = registry.active_count().await;
                            (active == total, Some(format!("{active}/{total} analyzers active")))
                        }
                        None => (false, None),
                    },
                    Capability::Persistence if !collaborators.persistence() => {
                        (false, Some("last call failed".to_string()))
                    }
                    Capability::Dashboard if !collaborators.dashboard() => {
                        (false, Some("last projection failed".to_string()))
                    }
                    _ => (true, None),
                }
            };
            entries.push(ComponentHealth {
                capability,
                configured,
                active,
                detail,
            });
        }

        let total = entries.len();
        let active = entries.iter().filter(|c| c.active).count();
        let score = if total == 0 { 0.0 } else { active as f64 / total as f64 };

        Self {
            state,
            score,
            status: HealthStatus::from_score(score, config),
            active_components: active,
            total_components: total,
            components: entries,
            checked_at: Utc::now(),
        }
    }
}
