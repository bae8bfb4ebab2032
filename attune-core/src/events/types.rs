//! Event envelope and response types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type tag
///
/// Serialized as its snake_case name. Any other string deserializes to
/// `Unknown` so that callers are never rejected for sending a new tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventTag {
    GameStart,
    GameEnd,
    UserInteraction,
    MetricsUpdate,
    TherapeuticSession,
    SystemOptimization,
    ProfileCreated,
    ProfileUpdated,
    ProfileAnalyzed,
    UserProfileInteraction,
    Unknown(String),
}

impl EventTag {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GameStart => "game_start",
            Self::GameEnd => "game_end",
            Self::UserInteraction => "user_interaction",
            Self::MetricsUpdate => "metrics_update",
            Self::TherapeuticSession => "therapeutic_session",
            Self::SystemOptimization => "system_optimization",
            Self::ProfileCreated => "profile_created",
            Self::ProfileUpdated => "profile_updated",
            Self::ProfileAnalyzed => "profile_analyzed",
            Self::UserProfileInteraction => "user_profile_interaction",
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<&str> for EventTag {
    fn from(tag: &str) -> Self {
        match tag {
            "game_start" => Self::GameStart,
            "game_end" => Self::GameEnd,
            "user_interaction" => Self::UserInteraction,
            "metrics_update" => Self::MetricsUpdate,
            "therapeutic_session" => Self::TherapeuticSession,
            "system_optimization" => Self::SystemOptimization,
            "profile_created" => Self::ProfileCreated,
            "profile_updated" => Self::ProfileUpdated,
            "profile_analyzed" => Self::ProfileAnalyzed,
            "user_profile_interaction" => Self::UserProfileInteraction,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for EventTag {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<EventTag> for String {
    fn from(tag: EventTag) -> Self {
        tag.as_str().to_string()
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound play/telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventTag,
    #[serde(default)]
    pub data: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(event_type: impl Into<EventTag>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Response returned for every processed event
///
/// `process_event` never fails; failures are reported through `success`
/// and `error` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub success: bool,
    /// Wall-clock handling time in milliseconds.
    pub response_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventResponse {
    pub fn ok(result: Value, response_time: f64) -> Self {
        Self {
            success: true,
            response_time,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, response_time: f64) -> Self {
        Self {
            success: false,
            response_time,
            result: None,
            error: Some(error.into()),
        }
    }
}
