//! Typed views over `Event.data`
//!
//! Field names accept both camelCase (what game clients send) and
//! snake_case. Every numeric field is optional; consumers decide what an
//! absent value means.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::difficulty::DifficultyTier;
use crate::error::ValidationError;

/// Raw session payload carried by game and therapeutic events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionData {
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(alias = "activity_id", alias = "gameId", alias = "game_id")]
    pub activity_id: String,
    #[serde(alias = "session_id", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub performance: PerformanceData,
    #[serde(alias = "sensory_data")]
    pub sensory_data: SensoryData,
    /// Recall outcomes for learned content touched during the session.
    pub reviews: Vec<ReviewInput>,
}

/// Performance fields reported by a game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceData {
    pub score: Option<f64>,
    /// Fraction of correct responses in `[0, 1]`. Presence marks a scored attempt.
    pub accuracy: Option<f64>,
    #[serde(alias = "completion_time")]
    pub completion_time: Option<f64>,
    #[serde(alias = "hints_used")]
    pub hints_used: Option<f64>,
    pub attempts: Option<f64>,
    pub completed: Option<f64>,
    pub errors: Option<f64>,
    #[serde(alias = "reaction_time_ms")]
    pub reaction_time_ms: Option<f64>,
    #[serde(alias = "time_on_task")]
    pub time_on_task: Option<f64>,
    pub interactions: Option<f64>,
    #[serde(alias = "focus_time")]
    pub focus_time: Option<f64>,
    #[serde(alias = "frustration_events")]
    pub frustration_events: Option<f64>,
    #[serde(alias = "help_requests")]
    pub help_requests: Option<f64>,
    #[serde(alias = "self_corrections")]
    pub self_corrections: Option<f64>,
    pub retries: Option<f64>,
    pub difficulty: Option<DifficultyTier>,
}

/// Sensory response fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SensoryData {
    #[serde(alias = "visual_responses")]
    pub visual_responses: Option<f64>,
    #[serde(alias = "auditory_responses")]
    pub auditory_responses: Option<f64>,
    #[serde(alias = "tactile_responses")]
    pub tactile_responses: Option<f64>,
    #[serde(alias = "overload_events")]
    pub overload_events: Option<f64>,
    #[serde(alias = "calming_breaks")]
    pub calming_breaks: Option<f64>,
}

/// Outcome of one review/test of a learned item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    #[serde(alias = "item_id")]
    pub item_id: String,
    pub recalled: bool,
    /// Graded recall in `[0, 1]`; defaults to 1.0/0.0 from `recalled`.
    #[serde(default)]
    pub score: Option<f64>,
    /// Days since the previous review, when the client knows it.
    #[serde(default, alias = "elapsed_days")]
    pub elapsed_days: Option<f64>,
}

/// Payload of profile lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub profile: Value,
    #[serde(default)]
    pub reviews: Vec<ReviewInput>,
}

/// Deserialize an event's data object.
pub(crate) fn parse<T: DeserializeOwned>(data: &Value) -> Result<T, ValidationError> {
    if !data.is_object() {
        return Err(ValidationError::NotAnObject);
    }
    serde_json::from_value(data.clone()).map_err(|e| ValidationError::from_serde("data", &e))
}

fn check_fraction(field: &str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: format!("{v} is outside [0, 1]"),
        }),
        _ => Ok(()),
    }
}

fn check_non_negative(field: &str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: format!("{v} must be a non-negative number"),
        }),
        _ => Ok(()),
    }
}

impl SessionData {
    /// Parse and validate a session payload.
    pub fn from_event_data(data: &Value) -> Result<Self, ValidationError> {
        let session: Self = parse(data)?;
        session.validate()?;
        Ok(session)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user_id"));
        }
        let p = &self.performance;
        check_fraction("performance.accuracy", p.accuracy)?;
        check_non_negative("performance.completion_time", p.completion_time)?;
        check_non_negative("performance.hints_used", p.hints_used)?;
        for review in &self.reviews {
            review.validate()?;
        }
        Ok(())
    }

    /// Require an activity id (scored attempts and session starts).
    pub fn require_activity(&self) -> Result<&str, ValidationError> {
        if self.activity_id.trim().is_empty() {
            return Err(ValidationError::MissingField("activity_id"));
        }
        Ok(&self.activity_id)
    }

    /// A scored attempt carries an accuracy figure.
    pub fn is_scored_attempt(&self) -> bool {
        self.performance.accuracy.is_some()
    }
}

impl ReviewInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.item_id.trim().is_empty() {
            return Err(ValidationError::MissingField("reviews.item_id"));
        }
        check_fraction("reviews.score", self.score)?;
        check_non_negative("reviews.elapsed_days", self.elapsed_days)
    }

    /// Recall strength in `[0, 1]`.
    pub fn strength(&self) -> f64 {
        self.score
            .unwrap_or(if self.recalled { 1.0 } else { 0.0 })
            .clamp(0.0, 1.0)
    }
}

impl ProfilePayload {
    pub fn from_event_data(data: &Value) -> Result<Self, ValidationError> {
        let payload: Self = parse(data)?;
        if payload.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user_id"));
        }
        for review in &payload.reviews {
            review.validate()?;
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_camel_and_snake_case() {
        let camel = SessionData::from_event_data(&json!({
            "userId": "u1",
            "activityId": "a1",
            "performance": {"accuracy": 0.8, "hintsUsed": 2}
        }))
        .unwrap();
        let snake = SessionData::from_event_data(&json!({
            "user_id": "u1",
            "activity_id": "a1",
            "performance": {"accuracy": 0.8, "hints_used": 2}
        }))
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.performance.hints_used, Some(2.0));
    }

    #[test]
    fn missing_user_is_rejected() {
        let err = SessionData::from_event_data(&json!({"activityId": "a1"})).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("user_id"));
    }

    #[test]
    fn non_object_data_is_rejected() {
        let err = SessionData::from_event_data(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject);
    }

    #[test]
    fn accuracy_out_of_range_is_rejected() {
        let err = SessionData::from_event_data(&json!({
            "userId": "u1",
            "performance": {"accuracy": 1.5}
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { .. }));
    }

    #[test]
    fn ill_typed_field_is_a_validation_error() {
        let err = SessionData::from_event_data(&json!({
            "userId": "u1",
            "performance": {"accuracy": "high"}
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { .. }));
    }

    #[test]
    fn review_strength_defaults_from_recalled() {
        let ok = ReviewInput {
            item_id: "w".into(),
            recalled: true,
            score: None,
            elapsed_days: None,
        };
        let partial = ReviewInput {
            score: Some(0.4),
            ..ok.clone()
        };
        assert_eq!(ok.strength(), 1.0);
        assert_eq!(partial.strength(), 0.4);
    }

    #[test]
    fn scored_attempt_requires_accuracy() {
        let mut session = SessionData {
            user_id: "u1".into(),
            ..Default::default()
        };
        assert!(!session.is_scored_attempt());
        session.performance.accuracy = Some(0.5);
        assert!(session.is_scored_attempt());
    }
}
