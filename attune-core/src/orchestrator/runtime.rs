//! Orchestrator: lifecycle, event dispatch, escalation and background loops

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::health::{Capability, CollaboratorHealth, Components, HealthReport, HealthStatus};
use super::state::{OrchestratorState, StateMachine, StateTransition};
use super::stats::{Statistics, StatisticsSnapshot};
use super::ticker::{TickFn, Tickers};
use crate::analyzers::{Analyzer, AnalyzerRegistry, EngagementAnalyzer, SensoryRegulationAnalyzer};
use crate::config::AttuneConfig;
use crate::dashboard::DashboardProjector;
use crate::difficulty::AdaptiveDifficultyEngine;
use crate::error::{AttuneError, Result, panic_message};
use crate::events::{Event, EventResponse};
use crate::metrics::MetricsAggregator;
use crate::persistence::{Persistence, PersistenceGateway, RetryPolicy};
use crate::retention::RetentionScheduler;

/// Shared orchestrator internals. Background tasks hold a `Weak` to this.
pub(super) struct Inner {
    pub(super) config: AttuneConfig,
    pub(super) state: StateMachine,
    pub(super) stats: Statistics,
    pub(super) components: Components,
    pub(super) collaborators: CollaboratorHealth,
    started_at: Instant,
    /// Serializes `initialize` calls.
    init_lock: Mutex<()>,
    setup_complete: AtomicBool,
    setup_runs: AtomicU64,
    tickers: Mutex<Option<Tickers>>,
    shutdown: CancellationToken,
}

/// Builds an [`Orchestrator`] from configuration and collaborators.
pub struct OrchestratorBuilder {
    config: AttuneConfig,
    analyzers: Vec<(String, Arc<dyn Analyzer>)>,
    gateway: Option<Arc<dyn PersistenceGateway>>,
    projector: Option<Arc<dyn DashboardProjector>>,
    disabled: Vec<Capability>,
    background_tasks: bool,
}

impl OrchestratorBuilder {
    /// Register an analyzer.
    #[must_use]
    pub fn with_analyzer(mut self, name: impl Into<String>, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzers.push((name.into(), analyzer));
        self
    }

    /// Register the engagement and sensory regulation analyzers.
    #[must_use]
    pub fn with_builtin_analyzers(self) -> Self {
        self.with_analyzer("engagement", Arc::new(EngagementAnalyzer::new()))
            .with_analyzer("sensory_regulation", Arc::new(SensoryRegulationAnalyzer::new()))
    }

    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn PersistenceGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[must_use]
    pub fn with_projector(mut self, projector: Arc<dyn DashboardProjector>) -> Self {
        self.projector = Some(projector);
        self
    }

    /// Leave a built-in capability out.
    #[must_use]
    pub fn without(mut self, capability: Capability) -> Self {
        self.disabled.push(capability);
        self
    }

    /// Whether `initialize` starts the monitoring and optimization loops.
    #[must_use]
    pub fn with_background_tasks(mut self, enabled: bool) -> Self {
        self.background_tasks = enabled;
        self
    }

    pub async fn build(self) -> Orchestrator {
        let registry = AnalyzerRegistry::new(&self.config.analyzers);
        for (name, analyzer) in self.analyzers {
            registry.register(name, analyzer).await;
        }

        let mut components = Components {
            metrics: Some(MetricsAggregator::new()),
            analyzers: Some(Arc::new(registry)),
            difficulty: Some(Arc::new(AdaptiveDifficultyEngine::new(
                self.config.difficulty.clone(),
            ))),
            retention: Some(Arc::new(RetentionScheduler::new(self.config.retention.clone()))),
            persistence: self
                .gateway
                .map(|g| Persistence::new(g, RetryPolicy::new(&self.config.persistence))),
            dashboard: self.projector,
        };
        for capability in self.disabled {
            components.remove(capability);
        }

        let background = self.background_tasks;
        let inner = Arc::new(Inner {
            config: self.config,
            state: StateMachine::new(),
            stats: Statistics::new(),
            components,
            collaborators: CollaboratorHealth::default(),
            started_at: Instant::now(),
            init_lock: Mutex::new(()),
            setup_complete: AtomicBool::new(false),
            setup_runs: AtomicU64::new(0),
            tickers: Mutex::new(None),
            shutdown: CancellationToken::new(),
        });

        Orchestrator { inner, background }
    }
}

/// Result of one optimization cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    /// Cycle number, or `None` when the cycle was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u64>,
    pub state: OrchestratorState,
    pub average_response_time: f64,
    pub error_rate: f64,
    pub tracked_difficulty_keys: usize,
    pub tracked_review_items: usize,
    pub actions: Vec<String>,
}

/// Top-level engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
    background: bool,
}

impl Orchestrator {
    pub fn builder(config: AttuneConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            analyzers: Vec::new(),
            gateway: None,
            projector: None,
            disabled: Vec::new(),
            background_tasks: true,
        }
    }

    pub fn config(&self) -> &AttuneConfig {
        &self.inner.config
    }

    pub async fn state(&self) -> OrchestratorState {
        self.inner.state.current().await
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<StateTransition> {
        self.inner.state.subscribe()
    }

    pub fn difficulty(&self) -> Option<&Arc<AdaptiveDifficultyEngine>> {
        self.inner.components.difficulty.as_ref()
    }

    pub fn retention(&self) -> Option<&Arc<RetentionScheduler>> {
        self.inner.components.retention.as_ref()
    }

    pub fn analyzers(&self) -> Option<&Arc<AnalyzerRegistry>> {
        self.inner.components.analyzers.as_ref()
    }

    /// Times collaborator setup has run.
    pub fn setup_runs(&self) -> u64 {
        self.inner.setup_runs.load(Ordering::SeqCst)
    }

    /// Run collaborator setup, start background loops and become READY.
    ///
    /// Idempotent: once set up, later calls return the current state without
    /// running setup again. After a failed setup (state ERROR) a new call
    /// retries it and recovers through MAINTENANCE.
    pub async fn initialize(&self) -> Result<OrchestratorState> {
        let inner = &self.inner;
        let _guard = inner.init_lock.lock().await;

        let state = inner.state.current().await;
        let needs_setup = matches!(
            state,
            OrchestratorState::Initializing | OrchestratorState::Error
        );
        if inner.setup_complete.load(Ordering::SeqCst) || !needs_setup {
            debug!(state = %state, "Orchestrator already initialized");
            return Ok(state);
        }

        info!("Initializing orchestrator");
        inner.setup_runs.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = inner.setup().await {
            error!(error = %e, "Orchestrator setup failed");
            if state != OrchestratorState::Error {
                inner.state.transition(OrchestratorState::Error, e.to_string()).await?;
            }
            return Err(e);
        }
        inner.setup_complete.store(true, Ordering::SeqCst);

        if self.background {
            self.start_background_tasks().await;
        }

        if state == OrchestratorState::Error {
            inner
                .state
                .transition(OrchestratorState::Maintenance, "setup retried")
                .await?;
            inner
                .state
                .transition(OrchestratorState::Ready, "setup complete")
                .await?;
        } else {
            inner
                .state
                .transition(OrchestratorState::Ready, "setup complete")
                .await?;
        }
        inner.stats.reset_window();

        Ok(OrchestratorState::Ready)
    }

    async fn start_background_tasks(&self) {
        let mut slot = self.inner.tickers.lock().await;
        if slot.is_some() || self.inner.shutdown.is_cancelled() {
            return;
        }

        let mut tickers = Tickers::new(self.inner.shutdown.clone());
        let weak = Arc::downgrade(&self.inner);

        let monitor: TickFn = {
            let weak = Weak::clone(&weak);
            Arc::new(move || {
                let weak = Weak::clone(&weak);
                Box::pin(async move {
                    let Some(inner) = weak.upgrade() else {
                        return Ok(());
                    };
                    let report = inner.run_health_check().await;
                    debug!(score = report.score, status = ?report.status, "Monitoring tick");
                    Ok(())
                })
            })
        };
        let optimize: TickFn = Arc::new(move || {
            let weak = Weak::clone(&weak);
            Box::pin(async move {
                let Some(inner) = weak.upgrade() else {
                    return Ok(());
                };
                inner
                    .run_optimization_cycle()
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
        });

        let config = &self.inner.config.orchestrator;
        tickers.spawn("monitoring", config.monitoring_interval(), monitor);
        tickers.spawn("optimization", config.optimization_interval(), optimize);
        *slot = Some(tickers);
    }

    /// Dispatch one event. Never fails; errors become `success: false`.
    pub async fn process_event(&self, event: Event) -> EventResponse {
        self.inner.process_event(event).await
    }

    pub async fn get_unified_statistics(&self) -> StatisticsSnapshot {
        let inner = &self.inner;
        let health = inner.health().await;
        inner
            .stats
            .snapshot(health.state, inner.started_at.elapsed(), health)
    }

    pub async fn get_system_health(&self) -> HealthReport {
        self.inner.health().await
    }

    /// Evaluate health and, if good enough, move MAINTENANCE back to READY.
    ///
    /// ERROR is only entered by a failed setup; `initialize` recovers from it.
    pub async fn run_health_check(&self) -> HealthReport {
        self.inner.run_health_check().await
    }

    /// Run one optimization cycle now. Skipped unless READY or RUNNING.
    pub async fn run_optimization_cycle(&self) -> Result<OptimizationReport> {
        self.inner.run_optimization_cycle().await
    }

    /// Put the orchestrator into MAINTENANCE on operator request.
    pub async fn enter_maintenance(&self, reason: &str) -> Result<StateTransition> {
        Ok(self
            .inner
            .state
            .transition(OrchestratorState::Maintenance, reason)
            .await?)
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down orchestrator");
        self.inner.shutdown.cancel();
        let tickers = self.inner.tickers.lock().await.take();
        if let Some(tickers) = tickers {
            tickers.stop().await;
        }
    }

    /// Whether background tasks are running.
    pub async fn background_tasks_running(&self) -> bool {
        self.inner
            .tickers
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_empty())
    }
}

impl Inner {
    async fn setup(&self) -> Result<()> {
        if let Some(registry) = &self.components.analyzers {
            let failures = registry.initialize_all().await;
            if !failures.is_empty() {
                warn!(count = failures.len(), "Some analyzers failed to initialize");
            }
        }
        if let Some(persistence) = &self.components.persistence {
            persistence.initialize().await?;
        }
        Ok(())
    }

    async fn health(&self) -> HealthReport {
        let state = self.state.current().await;
        HealthReport::evaluate(
            &self.components,
            &self.collaborators,
            &self.config.orchestrator,
            state,
        )
        .await
    }

    async fn process_event(&self, event: Event) -> EventResponse {
        let started = Instant::now();
        let state = self.state.current().await;

        if !state.accepts_events() {
            self.stats.record_rejected();
            self.stats.record_error();
            let err = AttuneError::Unavailable(state);
            debug!(event_type = %event.event_type, state = %state, "Event rejected");
            return EventResponse::failed(err.to_string(), elapsed_ms(started.elapsed()));
        }

        if state == OrchestratorState::Ready {
            // A concurrent event may have got there first.
            let _ = self
                .state
                .transition_from(OrchestratorState::Ready, OrchestratorState::Running, "first event")
                .await;
        }

        let outcome = match AssertUnwindSafe(self.dispatch(&event)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(AttuneError::System(format!(
                "handler for {} panicked: {}",
                event.event_type,
                panic_message(panic.as_ref())
            ))),
        };

        let elapsed = started.elapsed();
        self.stats.record_event(elapsed);

        match outcome {
            Ok(result) => EventResponse::ok(result, elapsed_ms(elapsed)),
            Err(e) => {
                self.record_failure(&event, &e).await;
                EventResponse::failed(e.to_string(), elapsed_ms(elapsed))
            }
        }
    }

    async fn record_failure(&self, event: &Event, err: &AttuneError) {
        self.stats.record_error();
        match err {
            AttuneError::Validation(_) => {
                self.stats.record_validation_error();
                debug!(event_type = %event.event_type, error = %err, "Event rejected by validation");
            }
            AttuneError::Persistence(_) => {
                self.stats.record_persistence_failure();
                warn!(event_type = %event.event_type, error = %err, "Event failed on persistence");
            }
            _ if err.is_systemic() => {
                let rate = self.stats.record_systemic_error();
                error!(event_type = %event.event_type, error = %err, error_rate = rate, "Systemic fault while processing event");
                self.maybe_escalate(rate).await;
            }
            _ => warn!(event_type = %event.event_type, error = %err, "Event failed"),
        }
    }

    async fn maybe_escalate(&self, rate: f64) {
        let config = &self.config.orchestrator;
        if self.stats.window_events() < config.min_events_for_escalation
            || rate <= config.error_rate_threshold
        {
            return;
        }

        let state = self.state.current().await;
        if matches!(
            state,
            OrchestratorState::Ready | OrchestratorState::Running | OrchestratorState::Optimizing
        ) {
            let reason = format!(
                "error rate {:.2} above threshold {:.2}",
                rate, config.error_rate_threshold
            );
            if let Err(e) = self.state.transition(OrchestratorState::Maintenance, reason).await {
                debug!(error = %e, "Escalation lost a race with another transition");
            }
        }
    }

    async fn run_health_check(&self) -> HealthReport {
        self.stats.record_health_check();
        let mut report = self.health().await;

        if report.state == OrchestratorState::Maintenance {
            if report.status == HealthStatus::Critical {
                warn!(score = report.score, "Health check: still critical, staying in maintenance");
            } else if self
                .state
                .transition_from(
                    OrchestratorState::Maintenance,
                    OrchestratorState::Ready,
                    "health check passed",
                )
                .await
                .is_ok()
            {
                self.stats.reset_window();
                report = self.health().await;
            }
        }

        report
    }

    pub(super) async fn run_optimization_cycle(&self) -> Result<OptimizationReport> {
        let state = self.state.current().await;
        self.optimize_from(state).await
    }

    /// Run a cycle that was scheduled while the orchestrator was in `state`.
    /// Skipped when the state has moved on by the time the cycle starts.
    async fn optimize_from(&self, state: OrchestratorState) -> Result<OptimizationReport> {
        let tracked_difficulty_keys = match &self.components.difficulty {
            Some(engine) => engine.key_count().await,
            None => 0,
        };
        let tracked_review_items = match &self.components.retention {
            Some(scheduler) => scheduler.item_count().await,
            None => 0,
        };

        let mut report = OptimizationReport {
            cycle: None,
            state,
            average_response_time: self.stats.average_response_time_ms(),
            error_rate: self.stats.error_rate(),
            tracked_difficulty_keys,
            tracked_review_items,
            actions: Vec::new(),
        };

        if !state.can_optimize() {
            debug!(state = %state, "Optimization cycle skipped");
            return Ok(report);
        }

        if let Err(e) = self
            .state
            .transition_from(state, OrchestratorState::Optimizing, "optimization cycle")
            .await
        {
            debug!(error = %e, "Optimization cycle skipped, state changed before start");
            report.state = self.state.current().await;
            return Ok(report);
        }

        let budget = self.config.orchestrator.response_time_budget_ms;
        if report.average_response_time > budget {
            warn!(
                average_ms = report.average_response_time,
                budget_ms = budget,
                "Average response time over budget"
            );
            report.actions.push(format!(
                "average response time {:.1} ms exceeds budget {:.1} ms",
                report.average_response_time, budget
            ));
        }
        if !self.collaborators.persistence() {
            report.actions.push("persistence degraded; last call failed".to_string());
        }
        if !self.collaborators.dashboard() {
            report.actions.push("dashboard projection degraded".to_string());
        }

        let cycle = self.stats.record_optimization_cycle();
        report.cycle = Some(cycle);

        // Escalation may have moved us to MAINTENANCE meanwhile; leave that alone.
        match self
            .state
            .transition_from(OrchestratorState::Optimizing, state, "optimization cycle complete")
            .await
        {
            Ok(_) => report.state = state,
            Err(e) => {
                debug!(error = %e, "State changed during optimization");
                report.state = self.state.current().await;
            }
        }

        info!(cycle, actions = report.actions.len(), "Optimization cycle complete");
        Ok(report)
    }
}

fn elapsed_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1_000.0
}
