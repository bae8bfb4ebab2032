//! Error types for attune-core

use std::any::Any;

use thiserror::Error;

use crate::orchestrator::OrchestratorState;

/// Top-level error type for attune-core
#[derive(Error, Debug)]
pub enum AttuneError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Orchestrator unavailable in state {0}")]
    Unavailable(OrchestratorState),

    #[error("System error: {0}")]
    System(String),
}

impl AttuneError {
    /// Whether this error counts towards the escalation error rate.
    ///
    /// Only faults in dispatch/state logic escalate; bad payloads and
    /// collaborator trouble are handled locally.
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::System(_) | Self::State(_))
    }
}

/// Malformed event or session payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Event data must be a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ValidationError {
    /// Map a serde failure onto the payload as a whole.
    pub fn from_serde(field: &str, err: &serde_json::Error) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Failure of a single analysis collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0} ms")]
    TimedOut(u64),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// Failure of a single raw gateway call, as reported by the external gateway
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct GatewayError(pub String);

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A storage call that failed after bounded retries
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        operation: &'static str,
        attempts: u32,
        last_error: GatewayError,
    },

    #[error("{operation} timed out after {timeout_ms} ms")]
    TimedOut {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("No persistence gateway configured")]
    NotConfigured,
}

/// Errors from the orchestrator state machine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: OrchestratorState,
        to: OrchestratorState,
    },

    #[error("Expected state {expected}, found {actual}")]
    Unexpected {
        expected: OrchestratorState,
        actual: OrchestratorState,
    },
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result type alias for attune operations
pub type Result<T> = std::result::Result<T, AttuneError>;
