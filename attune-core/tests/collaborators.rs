//! Collaborator fault isolation
//!
//! Analyzer failures, analyzer panics and exhausted storage retries must never
//! take down event processing.

use std::sync::Arc;

use async_trait::async_trait;
use attune_core::{
    Analyzer, AnalyzerError, AttuneConfig, Event, InMemoryGateway, InMemoryProjector,
    Orchestrator, SessionData,
};
use serde_json::{Value, json};

struct FailingAnalyzer;

#[async_trait]
impl Analyzer for FailingAnalyzer {
    async fn analyze(
        &self,
        _user_id: &str,
        _session: &SessionData,
        _profile: Option<&Value>,
    ) -> Result<Value, AnalyzerError> {
        Err(AnalyzerError::Failed("model not loaded".into()))
    }
}

struct PanickingAnalyzer;

#[async_trait]
impl Analyzer for PanickingAnalyzer {
    async fn analyze(
        &self,
        _user_id: &str,
        _session: &SessionData,
        _profile: Option<&Value>,
    ) -> Result<Value, AnalyzerError> {
        panic!("index out of range");
    }
}

struct BrokenInitAnalyzer;

#[async_trait]
impl Analyzer for BrokenInitAnalyzer {
    async fn initialize(&self) -> Result<(), AnalyzerError> {
        Err(AnalyzerError::Failed("missing weights".into()))
    }

    async fn analyze(
        &self,
        _user_id: &str,
        _session: &SessionData,
        _profile: Option<&Value>,
    ) -> Result<Value, AnalyzerError> {
        Ok(json!({}))
    }
}

fn game_end() -> Event {
    Event::new(
        "game_end",
        json!({
            "userId": "u1",
            "activityId": "memory-match",
            "performance": { "accuracy": 0.8, "timeOnTask": 60.0, "focusTime": 50.0 },
        }),
    )
}

#[tokio::test]
async fn failing_analyzers_do_not_block_the_others() {
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = Orchestrator::builder(AttuneConfig::default())
        .with_builtin_analyzers()
        .with_analyzer("failing", Arc::new(FailingAnalyzer))
        .with_analyzer("panicking", Arc::new(PanickingAnalyzer))
        .with_gateway(gateway.clone())
        .with_projector(Arc::new(InMemoryProjector::new()))
        .with_background_tasks(false)
        .build()
        .await;
    orchestrator.initialize().await.unwrap();

    let response = orchestrator.process_event(game_end()).await;
    assert!(response.success, "{:?}", response.error);

    let result = response.result.unwrap();
    let results = result["analysis"]["results"].as_object().unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results["engagement"]["status"], "ok");
    assert_eq!(results["sensory_regulation"]["status"], "ok");
    assert_eq!(results["failing"]["status"], "err");
    assert_eq!(results["failing"]["reason"], "model not loaded");
    assert_eq!(results["panicking"]["status"], "err");

    assert_eq!(result["analysis"]["report"]["succeeded"].as_array().unwrap().len(), 2);
    assert_eq!(gateway.analyses().await.len(), 1);

    let stats = orchestrator.get_unified_statistics().await;
    assert_eq!(stats.collaborator_failures, 2);
    assert_eq!(stats.systemic_errors, 0);
}

#[tokio::test]
async fn analyzer_failing_initialize_is_disabled() {
    let orchestrator = Orchestrator::builder(AttuneConfig::default())
        .with_builtin_analyzers()
        .with_analyzer("broken", Arc::new(BrokenInitAnalyzer))
        .with_background_tasks(false)
        .build()
        .await;
    orchestrator.initialize().await.unwrap();

    let registry = orchestrator.analyzers().unwrap();
    assert_eq!(registry.len().await, 3);
    assert_eq!(registry.active_count().await, 2);

    let response = orchestrator.process_event(game_end()).await;
    let result = response.result.unwrap();
    let reason = result["analysis"]["results"]["broken"]["reason"]
        .as_str()
        .unwrap();
    assert!(reason.starts_with("disabled:"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_profile_retries_fail_the_event() {
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = Orchestrator::builder(AttuneConfig::default())
        .with_gateway(gateway.clone())
        .with_background_tasks(false)
        .build()
        .await;
    orchestrator.initialize().await.unwrap();

    let attempts = orchestrator.config().persistence.max_attempts;
    gateway.fail_next(attempts);

    let response = orchestrator
        .process_event(Event::new(
            "profile_updated",
            json!({ "userId": "u1", "profile": { "prefers": "visual" } }),
        ))
        .await;
    assert!(!response.success);
    let error = response.error.unwrap();
    assert!(error.contains("update_profile"), "{error}");
    assert!(error.contains(&format!("{attempts} attempts")), "{error}");

    let stats = orchestrator.get_unified_statistics().await;
    assert_eq!(stats.persistence_failures, 1);
    assert_eq!(stats.systemic_errors, 0);
    assert_eq!(stats.system_health.active_components, 4);
}

#[tokio::test(start_paused = true)]
async fn transient_profile_failures_are_retried() {
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = Orchestrator::builder(AttuneConfig::default())
        .with_gateway(gateway.clone())
        .with_background_tasks(false)
        .build()
        .await;
    orchestrator.initialize().await.unwrap();
    gateway.fail_next(2);

    let response = orchestrator
        .process_event(Event::new(
            "profile_created",
            json!({ "userId": "u1", "profile": { "age": 7 } }),
        ))
        .await;
    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.result.unwrap()["status"], "profile_saved");
    // One initialize call plus three update attempts.
    assert_eq!(gateway.call_count(), 4);
}
