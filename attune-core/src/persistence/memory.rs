//! In-memory gateway with failure injection

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{AnalysisRecord, PersistenceGateway, SessionRecord, merge_profile};
use crate::error::GatewayError;

#[derive(Default)]
struct Store {
    sessions: Vec<SessionRecord>,
    analyses: Vec<AnalysisRecord>,
    profiles: HashMap<String, Value>,
}

/// Gateway that keeps everything in memory.
///
/// `fail_next` and `set_unavailable` make calls fail on demand.
#[derive(Default)]
pub struct InMemoryGateway {
    store: RwLock<Store>,
    calls: AtomicU32,
    pending_failures: AtomicU32,
    unavailable: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Fail every call until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Calls received, failed ones included.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn sessions(&self) -> Vec<SessionRecord> {
        self.store.read().await.sessions.clone()
    }

    pub async fn analyses(&self) -> Vec<AnalysisRecord> {
        self.store.read().await.analyses.clone()
    }

    /// Seed a stored profile.
    pub async fn insert_profile(&self, user_id: impl Into<String>, profile: Value) {
        self.store.write().await.profiles.insert(user_id.into(), profile);
    }

    fn check(&self, operation: &str) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::new(format!("{operation}: store unavailable")));
        }
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(GatewayError::new(format!("{operation}: injected failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn initialize(&self) -> Result<(), GatewayError> {
        self.check("initialize")
    }

    async fn save_analysis_results(&self, record: &AnalysisRecord) -> Result<(), GatewayError> {
        self.check("save_analysis_results")?;
        self.store.write().await.analyses.push(record.clone());
        Ok(())
    }

    async fn save_game_session(&self, record: &SessionRecord) -> Result<(), GatewayError> {
        self.check("save_game_session")?;
        self.store.write().await.sessions.push(record.clone());
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Value>, GatewayError> {
        self.check("get_profile")?;
        Ok(self.store.read().await.profiles.get(user_id).cloned())
    }

    async fn update_profile(&self, user_id: &str, data: &Value) -> Result<(), GatewayError> {
        self.check("update_profile")?;
        let mut store = self.store.write().await;
        let profile = store
            .profiles
            .entry(user_id.to_string())
            .or_insert(Value::Null);
        merge_profile(profile, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fail_next_counts_down() {
        let gateway = InMemoryGateway::new();
        gateway.fail_next(1);
        assert!(gateway.get_profile("u1").await.is_err());
        assert_eq!(gateway.get_profile("u1").await, Ok(None));
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_fails_until_restored() {
        let gateway = InMemoryGateway::new();
        gateway.set_unavailable(true);
        assert!(gateway.update_profile("u1", &json!({"a": 1})).await.is_err());
        gateway.set_unavailable(false);
        gateway.update_profile("u1", &json!({"a": 1})).await.unwrap();
        gateway.update_profile("u1", &json!({"b": 2})).await.unwrap();
        assert_eq!(
            gateway.get_profile("u1").await.unwrap(),
            Some(json!({"a": 1, "b": 2}))
        );
    }
}
