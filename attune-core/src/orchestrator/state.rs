//! Orchestrator lifecycle state machine

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::info;

use crate::error::StateError;

/// Capacity of the transition broadcast channel.
const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    Initializing,
    Ready,
    Running,
    Optimizing,
    Maintenance,
    Error,
}

impl OrchestratorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Optimizing => "OPTIMIZING",
            Self::Maintenance => "MAINTENANCE",
            Self::Error => "ERROR",
        }
    }

    /// Whether `self → to` is in the transition table.
    pub fn can_transition_to(self, to: Self) -> bool {
        use OrchestratorState::*;
        matches!(
            (self, to),
            (Initializing, Ready | Error)
                | (Ready, Running | Optimizing | Maintenance | Error)
                | (Running, Optimizing | Maintenance | Error)
                | (Optimizing, Ready | Running | Maintenance | Error)
                | (Maintenance, Ready | Error)
                | (Error, Maintenance)
        )
    }

    /// Whether events are dispatched in this state.
    pub fn accepts_events(self) -> bool {
        !matches!(self, Self::Initializing | Self::Error)
    }

    /// Whether an optimization cycle may start from this state.
    pub fn can_optimize(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: OrchestratorState,
    pub to: OrchestratorState,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Holds the current state. All changes go through [`StateMachine::transition`],
/// which applies one transition at a time and broadcasts it.
pub struct StateMachine {
    state: RwLock<OrchestratorState>,
    transitions: broadcast::Sender<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(OrchestratorState::Initializing),
            transitions,
        }
    }

    pub async fn current(&self) -> OrchestratorState {
        *self.state.read().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateTransition> {
        self.transitions.subscribe()
    }

    /// Move from the current state to `to`.
    pub async fn transition(
        &self,
        to: OrchestratorState,
        reason: impl Into<String>,
    ) -> Result<StateTransition, StateError> {
        let mut state = self.state.write().await;
        self.apply(&mut state, to, reason.into())
    }

    /// Move to `to` only if the current state is `expected`.
    pub async fn transition_from(
        &self,
        expected: OrchestratorState,
        to: OrchestratorState,
        reason: impl Into<String>,
    ) -> Result<StateTransition, StateError> {
        let mut state = self.state.write().await;
        if *state != expected {
            return Err(StateError::Unexpected {
                expected,
                actual: *state,
            });
        }
        self.apply(&mut state, to, reason.into())
    }

    fn apply(
        &self,
        state: &mut OrchestratorState,
        to: OrchestratorState,
        reason: String,
    ) -> Result<StateTransition, StateError> {
        let from = *state;
        if !from.can_transition_to(to) {
            return Err(StateError::InvalidTransition { from, to });
        }
        *state = to;

        let transition = StateTransition {
            from,
            to,
            reason,
            at: Utc::now(),
        };
        info!(from = %from, to = %to, reason = %transition.reason, "Orchestrator state changed");
        // No subscribers is fine.
        let _ = self.transitions.send(transition.clone());
        Ok(transition)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrchestratorState::*;

    const ALL: [OrchestratorState; 6] = [Initializing, Ready, Running, Optimizing, Maintenance, Error];

    #[test]
    fn every_state_can_fail_except_error() {
        for state in ALL {
            assert_eq!(state.can_transition_to(Error), state != Error, "{state}");
        }
    }

    #[test]
    fn only_running_and_optimizing_cycle() {
        assert!(Running.can_transition_to(Optimizing));
        assert!(Optimizing.can_transition_to(Running));
        assert!(!Maintenance.can_transition_to(Running));
        assert!(!Error.can_transition_to(Ready));
        for state in ALL {
            assert!(!state.can_transition_to(Initializing));
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn state_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Maintenance).unwrap(), "\"MAINTENANCE\"");
        assert_eq!(Optimizing.to_string(), "OPTIMIZING");
    }

    #[tokio::test]
    async fn transition_applies_and_broadcasts() {
        let machine = StateMachine::new();
        let mut rx = machine.subscribe();

        machine.transition(Ready, "init complete").await.unwrap();
        assert_eq!(machine.current().await, Ready);

        let t = rx.recv().await.unwrap();
        assert_eq!((t.from, t.to), (Initializing, Ready));
        assert_eq!(t.reason, "init complete");
    }

    #[tokio::test]
    async fn invalid_transition_leaves_state_unchanged() {
        let machine = StateMachine::new();
        let err = machine.transition(Optimizing, "too early").await.unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidTransition {
                from: Initializing,
                to: Optimizing
            }
        );
        assert_eq!(machine.current().await, Initializing);
    }

    #[tokio::test]
    async fn transition_from_checks_expected_state() {
        let machine = StateMachine::new();
        machine.transition(Ready, "init").await.unwrap();

        let err = machine
            .transition_from(Optimizing, Running, "cycle done")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StateError::Unexpected {
                expected: Optimizing,
                actual: Ready
            }
        );
        machine.transition_from(Ready, Running, "first event").await.unwrap();
        assert_eq!(machine.current().await, Running);
    }
}
