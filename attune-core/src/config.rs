//! Configuration types.
//!
//! Every threshold the engine uses is injected from here; nothing in the
//! algorithms reads a hard-coded constant. All sections use `#[serde(default)]`
//! so a partial TOML file only overrides what it names.

use std::time::Duration;

use attune_observe::LogConfig;
use serde::{Deserialize, Serialize};

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttuneConfig {
    /// Lifecycle, escalation and background loop settings.
    pub orchestrator: OrchestratorConfig,
    /// Adaptive difficulty thresholds.
    pub difficulty: DifficultyConfig,
    /// Forgetting curve and review schedule settings.
    pub retention: RetentionConfig,
    /// Retry and timeout policy for storage calls.
    pub persistence: PersistenceConfig,
    /// Analyzer fan-out settings.
    pub analyzers: AnalyzerConfig,
    /// Dashboard projection settings.
    pub dashboard: DashboardConfig,
    /// Logging output.
    pub logging: LogConfig,
}

impl AttuneConfig {
    /// Parse a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Render as a TOML document.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Orchestrator lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Interval between monitoring ticks.
    pub monitoring_interval_ms: u64,
    /// Interval between optimization cycles.
    pub optimization_interval_ms: u64,
    /// Fraction of failed events (systemic faults only) that triggers MAINTENANCE.
    pub error_rate_threshold: f64,
    /// Events that must be observed before the error rate is trusted.
    pub min_events_for_escalation: u64,
    /// Health score at or above which the system is `healthy`.
    pub healthy_threshold: f64,
    /// Health score at or above which the system is `warning` (below: `critical`).
    pub warning_threshold: f64,
    /// Average response time above which an optimization cycle logs a warning.
    pub response_time_budget_ms: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            monitoring_interval_ms: 30_000,
            optimization_interval_ms: 300_000,
            error_rate_threshold: 0.25,
            min_events_for_escalation: 10,
            healthy_threshold: 0.8,
            warning_threshold: 0.5,
            response_time_budget_ms: 250.0,
        }
    }
}

impl OrchestratorConfig {
    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring_interval_ms.max(1))
    }

    pub fn optimization_interval(&self) -> Duration {
        Duration::from_millis(self.optimization_interval_ms.max(1))
    }
}

/// Adaptive difficulty configuration.
///
/// Up- and down-thresholds differ on purpose; keep
/// `medium_to_easy_accuracy < easy_to_medium_accuracy` and
/// `hard_to_medium_accuracy < medium_to_hard_accuracy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Capacity of each rolling history.
    pub window_capacity: usize,
    /// Records required before the tier can move off MEDIUM.
    pub min_records: usize,
    /// Most recent points used for the trend slope.
    pub trend_window: usize,
    pub easy_to_medium_accuracy: f64,
    pub medium_to_hard_accuracy: f64,
    pub medium_to_easy_accuracy: f64,
    pub hard_to_medium_accuracy: f64,
    /// Slope below which performance counts as declining.
    pub decline_trend: f64,
    /// Attempts ahead that `predict_score` extrapolates the trend.
    pub prediction_horizon: f64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            window_capacity: 10,
            min_records: 3,
            trend_window: 5,
            easy_to_medium_accuracy: 0.70,
            medium_to_hard_accuracy: 0.80,
            medium_to_easy_accuracy: 0.30,
            hard_to_medium_accuracy: 0.40,
            decline_trend: -0.10,
            prediction_horizon: 10.0,
        }
    }
}

/// Retention scheduling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Base review offsets in days before personalization. Must be strictly increasing.
    pub base_offsets_days: Vec<f64>,
    pub default_initial_retention: f64,
    pub default_decay_rate: f64,
    pub min_decay_rate: f64,
    pub max_decay_rate: f64,
    /// Consolidation gained per successful recall.
    pub consolidation_gain: f64,
    /// Consolidation lost per failed recall.
    pub lapse_penalty: f64,
    pub min_consolidation: f64,
    pub max_consolidation: f64,
    /// Multiplier applied to the last successful interval after a lapse.
    pub lapse_factor: f64,
    /// Growth applied past the end of the base schedule.
    pub growth_factor: f64,
    /// Review outcomes kept per item for curve fitting.
    pub history_limit: usize,
    /// Interference resistance of a new item.
    pub default_interference_resistance: f64,
    /// Reviews at least this many days after the previous one test resistance
    /// to interference.
    pub long_interval_days: f64,
    /// How far the recall rate over long intervals moves resistance away
    /// from the default.
    pub interference_gain: f64,
    pub min_interference_resistance: f64,
    pub max_interference_resistance: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            base_offsets_days: vec![1.0, 3.0, 7.0, 14.0, 30.0, 60.0],
            default_initial_retention: 0.9,
            default_decay_rate: 0.3,
            min_decay_rate: 0.01,
            max_decay_rate: 2.0,
            consolidation_gain: 0.2,
            lapse_penalty: 0.3,
            min_consolidation: 0.5,
            max_consolidation: 3.0,
            lapse_factor: 0.5,
            growth_factor: 1.5,
            history_limit: 20,
            default_interference_resistance: 1.0,
            long_interval_days: 3.0,
            interference_gain: 0.5,
            min_interference_resistance: 0.5,
            max_interference_resistance: 2.0,
        }
    }
}

/// Retry policy for persistence calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    /// Budget for all attempts of one call, delays included.
    pub overall_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            backoff_multiplier: 2.0,
            max_delay_ms: 2_000,
            overall_timeout_ms: 10_000,
        }
    }
}

/// Analyzer fan-out configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Per-analyzer timeout.
    pub timeout_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

/// Dashboard projection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Timeout for one projection call.
    pub timeout_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl DashboardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}
