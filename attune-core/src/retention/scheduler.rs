//! Per-item retention profiles and review interval selection

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::curve::{ForgettingCurve, ReviewRecord, next_review_schedule, personalized_forgetting_curve};
use crate::config::RetentionConfig;
use crate::events::ReviewInput;
use crate::keyed::KeyedSlots;

/// Intervals are capped at a century.
const MAX_INTERVAL_DAYS: f64 = 36_500.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Memory model of one item for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionProfile {
    pub item_id: String,
    pub initial_retention: f64,
    pub decay_rate: f64,
    pub consolidation_factor: f64,
    pub interference_resistance: f64,
    pub review_count: u32,
    /// Consecutive successful recalls.
    pub streak: u32,
    pub lapses: u32,
    /// Interval chosen by the most recent review, in days.
    pub last_interval_days: f64,
    /// Interval chosen by the most recent successful review, in days.
    pub last_success_interval_days: f64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    history: Vec<ReviewRecord>,
}

impl RetentionProfile {
    pub fn new(item_id: impl Into<String>, config: &RetentionConfig) -> Self {
        Self {
            item_id: item_id.into(),
            initial_retention: config.default_initial_retention,
            decay_rate: config.default_decay_rate,
            consolidation_factor: 1.0,
            interference_resistance: config.default_interference_resistance,
            review_count: 0,
            streak: 0,
            lapses: 0,
            last_interval_days: 0.0,
            last_success_interval_days: 0.0,
            last_reviewed_at: None,
            next_review_at: None,
            history: Vec::new(),
        }
    }

    /// Review outcomes, oldest first.
    pub fn history(&self) -> &[ReviewRecord] {
        &self.history
    }

    /// Curve fitted from the profile's current state.
    pub fn curve(&self, config: &RetentionConfig) -> ForgettingCurve {
        personalized_forgetting_curve(self, &self.history, config)
    }

    fn record(&mut self, record: ReviewRecord, limit: usize) {
        self.history.push(record);
        let excess = self.history.len().saturating_sub(limit.max(1));
        self.history.drain(..excess);
    }

    /// Apply one review and choose the next interval.
    fn apply(&mut self, review: &ReviewInput, at: DateTime<Utc>, config: &RetentionConfig) -> ReviewPlan {
        let elapsed_days = review.elapsed_days.unwrap_or_else(|| {
            self.last_reviewed_at.map_or(0.0, |last| {
                ((at - last).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0)
            })
        });

        self.record(
            ReviewRecord {
                reviewed_at: at,
                elapsed_days,
                strength: review.strength(),
                recalled: review.recalled,
            },
            config.history_limit,
        );

        let curve = personalized_forgetting_curve(self, &self.history, config);
        self.decay_rate = curve.decay_rate;
        self.consolidation_factor = curve.consolidation_factor;
        self.interference_resistance = curve.interference_resistance;

        let schedule = next_review_schedule(&curve, config);
        let growth = config.growth_factor.max(1.0 + f64::EPSILON);

        let interval = if review.recalled {
            self.streak += 1;
            let step = self.streak as usize;
            let mut interval = match schedule.get(step - 1) {
                Some(offset) => *offset,
                None => {
                    let last = schedule.last().copied().unwrap_or(1.0);
                    let beyond = (step - schedule.len()) as i32;
                    last * growth.powi(beyond)
                }
            };
            if self.streak > 1 && interval <= self.last_interval_days {
                interval = self.last_interval_days * growth;
            }
            let interval = interval.min(MAX_INTERVAL_DAYS);
            self.last_success_interval_days = interval;
            interval
        } else {
            self.streak = 0;
            self.lapses += 1;
            let first = schedule.first().copied().unwrap_or(1.0);
            if self.last_success_interval_days > 0.0 {
                first.min(self.last_success_interval_days * config.lapse_factor.clamp(f64::EPSILON, 1.0))
            } else {
                first
            }
        };

        self.review_count += 1;
        self.last_interval_days = interval;
        self.last_reviewed_at = Some(at);
        let next_review_at = at + Duration::milliseconds((interval * MILLIS_PER_DAY) as i64);
        self.next_review_at = Some(next_review_at);

        ReviewPlan {
            item_id: self.item_id.clone(),
            recalled: review.recalled,
            interval_days: interval,
            next_review_at,
            predicted_retention: curve.retention_at(interval),
            streak: self.streak,
            schedule,
        }
    }
}

/// Next review decision for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPlan {
    pub item_id: String,
    pub recalled: bool,
    pub interval_days: f64,
    pub next_review_at: DateTime<Utc>,
    /// Retention the curve predicts at the next review.
    pub predicted_retention: f64,
    pub streak: u32,
    /// Personalized offsets the interval was drawn from.
    pub schedule: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RetentionKey {
    user_id: String,
    item_id: String,
}

/// Spaced-repetition scheduler over per-(user, item) profiles.
pub struct RetentionScheduler {
    config: RetentionConfig,
    profiles: KeyedSlots<RetentionKey, RetentionProfile>,
}

impl RetentionScheduler {
    pub fn new(config: RetentionConfig) -> Self {
        Self {
            config,
            profiles: KeyedSlots::new(),
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Record a review at `at` and schedule the next one.
    pub async fn update(&self, user_id: &str, review: &ReviewInput, at: DateTime<Utc>) -> ReviewPlan {
        let key = RetentionKey {
            user_id: user_id.to_string(),
            item_id: review.item_id.clone(),
        };
        let slot = self
            .profiles
            .get_or_insert_with(&key, || RetentionProfile::new(&review.item_id, &self.config))
            .await;
        let mut profile = slot.lock().await;
        let plan = profile.apply(review, at, &self.config);

        debug!(
            user_id,
            item_id = %plan.item_id,
            recalled = plan.recalled,
            interval_days = plan.interval_days,
            "Scheduled next review"
        );
        plan
    }

    /// Copy of an item's profile.
    pub async fn profile(&self, user_id: &str, item_id: &str) -> Option<RetentionProfile> {
        let key = RetentionKey {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
        };
        let slot = self.profiles.get(&key).await?;
        let profile = slot.lock().await;
        Some(profile.clone())
    }

    /// Number of tracked (user, item) pairs.
    pub async fn item_count(&self) -> usize {
        self.profiles.len().await
    }
}
