//! Lock-free orchestrator counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::health::HealthReport;
use super::state::OrchestratorState;

/// Monotonic counters. Only the escalation window is ever reset.
#[derive(Debug, Default)]
pub struct Statistics {
    total_events: AtomicU64,
    total_sessions: AtomicU64,
    total_errors: AtomicU64,
    validation_errors: AtomicU64,
    systemic_errors: AtomicU64,
    rejected_events: AtomicU64,
    collaborator_failures: AtomicU64,
    persistence_failures: AtomicU64,
    optimization_cycles: AtomicU64,
    health_checks: AtomicU64,
    response_time_micros: AtomicU64,
    window_events: AtomicU64,
    window_systemic_errors: AtomicU64,
}

fn bump(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one dispatched event and its response time.
    pub fn record_event(&self, elapsed: Duration) {
        bump(&self.total_events);
        bump(&self.window_events);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.response_time_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_session(&self) {
        bump(&self.total_sessions);
    }

    /// Count a failed response.
    pub fn record_error(&self) {
        bump(&self.total_errors);
    }

    pub fn record_validation_error(&self) {
        bump(&self.validation_errors);
    }

    /// Count a systemic fault and return the escalation window's error rate.
    pub fn record_systemic_error(&self) -> f64 {
        bump(&self.systemic_errors);
        bump(&self.window_systemic_errors);
        self.window_error_rate()
    }

    /// Count an event refused because of the current state.
    pub fn record_rejected(&self) {
        bump(&self.rejected_events);
    }

    pub fn record_collaborator_failures(&self, n: u64) {
        self.collaborator_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        bump(&self.persistence_failures);
    }

    pub fn record_optimization_cycle(&self) -> u64 {
        bump(&self.optimization_cycles)
    }

    pub fn record_health_check(&self) {
        bump(&self.health_checks);
    }

    pub fn window_events(&self) -> u64 {
        self.window_events.load(Ordering::Relaxed)
    }

    /// Systemic errors per event since the window was last reset.
    pub fn window_error_rate(&self) -> f64 {
        let events = self.window_events.load(Ordering::Relaxed);
        if events == 0 {
            return 0.0;
        }
        self.window_systemic_errors.load(Ordering::Relaxed) as f64 / events as f64
    }

    /// Start a fresh escalation window after recovery.
    pub fn reset_window(&self) {
        self.window_events.store(0, Ordering::Relaxed);
        self.window_systemic_errors.store(0, Ordering::Relaxed);
    }

    /// Mean response time in milliseconds.
    pub fn average_response_time_ms(&self) -> f64 {
        let events = self.total_events.load(Ordering::Relaxed);
        if events == 0 {
            return 0.0;
        }
        self.response_time_micros.load(Ordering::Relaxed) as f64 / events as f64 / 1_000.0
    }

    /// Errors per dispatched event over the process lifetime.
    pub fn error_rate(&self) -> f64 {
        let events = self.total_events.load(Ordering::Relaxed);
        if events == 0 {
            return 0.0;
        }
        self.total_errors.load(Ordering::Relaxed) as f64 / events as f64
    }

    pub fn snapshot(
        &self,
        state: OrchestratorState,
        uptime: Duration,
        system_health: HealthReport,
    ) -> StatisticsSnapshot {
        StatisticsSnapshot {
            state,
            uptime_ms: u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX),
            total_events: self.total_events.load(Ordering::Relaxed),
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            validation_errors: self.validation_errors.load(Ordering::Relaxed),
            systemic_errors: self.systemic_errors.load(Ordering::Relaxed),
            rejected_events: self.rejected_events.load(Ordering::Relaxed),
            collaborator_failures: self.collaborator_failures.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            average_response_time: self.average_response_time_ms(),
            optimization_cycles: self.optimization_cycles.load(Ordering::Relaxed),
            health_checks: self.health_checks.load(Ordering::Relaxed),
            system_health,
        }
    }
}

/// Read-only view of the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub state: OrchestratorState,
    pub uptime_ms: u64,
    pub total_events: u64,
    pub total_sessions: u64,
    pub total_errors: u64,
    pub validation_errors: u64,
    pub systemic_errors: u64,
    pub rejected_events: u64,
    pub collaborator_failures: u64,
    pub persistence_failures: u64,
    /// Milliseconds.
    pub average_response_time: f64,
    pub optimization_cycles: u64,
    pub health_checks: u64,
    pub system_health: HealthReport,
}
