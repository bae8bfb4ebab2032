//! Read-model projection contract

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::DashboardView;
use crate::error::GatewayError;

/// Publishes dashboard views to an external read model.
#[async_trait]
pub trait DashboardProjector: Send + Sync {
    async fn project(&self, view: &DashboardView) -> Result<(), GatewayError>;
}

/// Keeps the latest view per user.
#[derive(Default)]
pub struct InMemoryProjector {
    views: RwLock<HashMap<String, DashboardView>>,
    projected: AtomicU64,
    failing: AtomicBool,
}

impl InMemoryProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every projection fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn latest(&self, user_id: &str) -> Option<DashboardView> {
        self.views.read().await.get(user_id).cloned()
    }

    /// Successful projections so far.
    pub fn projected(&self) -> u64 {
        self.projected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DashboardProjector for InMemoryProjector {
    async fn project(&self, view: &DashboardView) -> Result<(), GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::new("dashboard projection unavailable"));
        }
        self.views
            .write()
            .await
            .insert(view.user_id.clone(), view.clone());
        self.projected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
