//! Storage collaborator contract.
//!
//! The engine depends only on [`PersistenceGateway`]. Every call goes through
//! [`Persistence`], which applies the retry policy and turns exhausted
//! retries into a [`PersistenceError`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::analyzers::{AnalysisReport, AnalyzerResult};
use crate::difficulty::DifficultyDecision;
use crate::error::{GatewayError, PersistenceError};
use crate::metrics::SessionMetrics;
use crate::retention::ReviewPlan;

pub mod jsonl;
pub mod memory;
pub mod retry;

pub use jsonl::JsonlGateway;
pub use memory::InMemoryGateway;
pub use retry::RetryPolicy;

/// A processed game or therapeutic session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub activity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub event_type: String,
    pub metrics: SessionMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<DifficultyDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<ReviewPlan>,
    pub recorded_at: DateTime<Utc>,
}

/// Analyzer output for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub results: BTreeMap<String, AnalyzerResult>,
    pub report: AnalysisReport,
    pub recorded_at: DateTime<Utc>,
}

/// Storage backend for sessions, analyses and user profiles.
///
/// Implementations report raw failures; retrying is the caller's job.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Prepare the backend. Run once during orchestrator setup.
    async fn initialize(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn save_analysis_results(&self, record: &AnalysisRecord) -> Result<(), GatewayError>;

    async fn save_game_session(&self, record: &SessionRecord) -> Result<(), GatewayError>;

    /// The stored profile, or `None` for an unknown user.
    async fn get_profile(&self, user_id: &str) -> Result<Option<Value>, GatewayError>;

    /// Merge `data` into the stored profile, creating it if needed.
    async fn update_profile(&self, user_id: &str, data: &Value) -> Result<(), GatewayError>;
}

/// Shallow-merge `update` into `profile`. Non-object values replace it.
pub fn merge_profile(profile: &mut Value, update: &Value) {
    if let (Some(existing), Some(fields)) = (profile.as_object_mut(), update.as_object()) {
        for (key, value) in fields {
            existing.insert(key.clone(), value.clone());
        }
        return;
    }
    *profile = update.clone();
}

/// Retrying front for a gateway.
#[derive(Clone)]
pub struct Persistence {
    gateway: Arc<dyn PersistenceGateway>,
    policy: RetryPolicy,
}

impl Persistence {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, policy: RetryPolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn initialize(&self) -> Result<(), PersistenceError> {
        self.policy.run("initialize", || self.gateway.initialize()).await
    }

    pub async fn save_analysis_results(&self, record: &AnalysisRecord) -> Result<(), PersistenceError> {
        self.policy
            .run("save_analysis_results", || self.gateway.save_analysis_results(record))
            .await
    }

    pub async fn save_game_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        self.policy
            .run("save_game_session", || self.gateway.save_game_session(record))
            .await
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Value>, PersistenceError> {
        self.policy
            .run("get_profile", || self.gateway.get_profile(user_id))
            .await
    }

    pub async fn update_profile(&self, user_id: &str, data: &Value) -> Result<(), PersistenceError> {
        self.policy
            .run("update_profile", || self.gateway.update_profile(user_id, data))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_named_fields_only() {
        let mut profile = json!({"age": 7, "prefers": "visual"});
        merge_profile(&mut profile, &json!({"prefers": "auditory", "level": 2}));
        assert_eq!(profile, json!({"age": 7, "prefers": "auditory", "level": 2}));
    }

    #[test]
    fn merge_replaces_non_objects() {
        let mut profile = Value::Null;
        merge_profile(&mut profile, &json!({"age": 7}));
        assert_eq!(profile, json!({"age": 7}));
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_retries_through_gateway() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.fail_next(2);
        let persistence = Persistence::new(gateway.clone(), RetryPolicy::default());

        persistence
            .update_profile("u1", &json!({"age": 7}))
            .await
            .unwrap();

        assert_eq!(gateway.call_count(), 3);
        assert_eq!(
            persistence.get_profile("u1").await.unwrap(),
            Some(json!({"age": 7}))
        );
    }
}
