//! Per-key adaptive difficulty state
//!
//! Each `(user, activity)` pair has its own lock, so updates to one pair are
//! linearizable while different pairs never wait on each other.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::history::{PerformanceRecord, RollingHistory};
use super::policy::{DifficultyTier, HistoryStats, predict_score, recommend_difficulty};
use crate::config::DifficultyConfig;
use crate::keyed::KeyedSlots;

/// Identifies one rolling history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DifficultyKey {
    pub user_id: String,
    pub activity_id: String,
}

impl DifficultyKey {
    pub fn new(user_id: impl Into<String>, activity_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            activity_id: activity_id.into(),
        }
    }
}

/// Outcome of appending one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyDecision {
    pub previous_tier: DifficultyTier,
    pub tier: DifficultyTier,
    pub changed: bool,
    pub history_len: usize,
    pub evicted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_score: Option<f64>,
}

#[derive(Debug)]
struct KeyState {
    history: RollingHistory,
    tier: DifficultyTier,
}

impl KeyState {
    fn new(capacity: usize) -> Self {
        Self {
            history: RollingHistory::new(capacity),
            tier: DifficultyTier::Medium,
        }
    }
}

/// Adaptive difficulty engine.
pub struct AdaptiveDifficultyEngine {
    config: DifficultyConfig,
    states: KeyedSlots<DifficultyKey, KeyState>,
}

impl AdaptiveDifficultyEngine {
    pub fn new(config: DifficultyConfig) -> Self {
        Self {
            config,
            states: KeyedSlots::new(),
        }
    }

    pub fn config(&self) -> &DifficultyConfig {
        &self.config
    }

    async fn slot(&self, key: &DifficultyKey) -> Arc<Mutex<KeyState>> {
        let capacity = self.config.window_capacity;
        self.states
            .get_or_insert_with(key, || KeyState::new(capacity))
            .await
    }

    async fn existing(&self, key: &DifficultyKey) -> Option<Arc<Mutex<KeyState>>> {
        self.states.get(key).await
    }

    /// Append a record and recompute the key's tier.
    pub async fn update(
        &self,
        user_id: &str,
        activity_id: &str,
        record: PerformanceRecord,
    ) -> DifficultyDecision {
        let key = DifficultyKey::new(user_id, activity_id);
        let slot = self.slot(&key).await;
        let mut guard = slot.lock().await;
        let state = &mut *guard;

        let evicted = state.history.push(record).is_some();
        let previous_tier = state.tier;
        state.tier = recommend_difficulty(previous_tier, &state.history, &self.config);

        let stats = HistoryStats::compute(&state.history, &self.config);
        let decision = DifficultyDecision {
            previous_tier,
            tier: state.tier,
            changed: previous_tier != state.tier,
            history_len: state.history.len(),
            evicted,
            average_accuracy: stats.map(|s| s.average_accuracy),
            trend: stats.map(|s| s.trend),
            predicted_score: predict_score(&state.history, &self.config),
        };

        if decision.changed {
            info!(
                user_id,
                activity_id,
                from = %previous_tier,
                to = %decision.tier,
                "Difficulty tier changed"
            );
        } else {
            debug!(user_id, activity_id, tier = %decision.tier, len = decision.history_len, "Difficulty unchanged");
        }

        decision
    }

    /// Current tier for a key. MEDIUM for unknown keys.
    pub async fn recommend_difficulty(&self, user_id: &str, activity_id: &str) -> DifficultyTier {
        match self.existing(&DifficultyKey::new(user_id, activity_id)).await {
            Some(slot) => slot.lock().await.tier,
            None => DifficultyTier::Medium,
        }
    }

    /// Projected score in `[0, 100]`, or `None` with fewer than `min_records` records.
    pub async fn predict_score(&self, user_id: &str, activity_id: &str) -> Option<f64> {
        let slot = self.existing(&DifficultyKey::new(user_id, activity_id)).await?;
        let state = slot.lock().await;
        predict_score(&state.history, &self.config)
    }

    /// Copy of a key's history.
    pub async fn history(&self, user_id: &str, activity_id: &str) -> Option<RollingHistory> {
        let slot = self.existing(&DifficultyKey::new(user_id, activity_id)).await?;
        let state = slot.lock().await;
        Some(state.history.clone())
    }

    /// Drop a key's history and return its tier to MEDIUM.
    ///
    /// The slot is cleared in place so that an update racing with the reset
    /// lands either entirely before or entirely after it.
    pub async fn reset(&self, user_id: &str, activity_id: &str) -> bool {
        let Some(slot) = self.existing(&DifficultyKey::new(user_id, activity_id)).await else {
            return false;
        };
        let mut state = slot.lock().await;
        state.history.clear();
        state.tier = DifficultyTier::Medium;
        info!(user_id, activity_id, "Difficulty history reset");
        true
    }

    /// Number of keys seen so far.
    pub async fn key_count(&self) -> usize {
        self.states.len().await
    }
}
