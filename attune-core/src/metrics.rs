//! Session metrics aggregation.
//!
//! Pure mapping from a raw session payload into the four metric categories
//! consumed downstream. Absent fields become `0.0`, never `None`, since every
//! consumer assumes numbers.

use serde::{Deserialize, Serialize};

use crate::events::SessionData;

/// Engagement metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Seconds spent on task.
    pub time_on_task: f64,
    pub interaction_count: f64,
    /// `completed / attempts`, or 0 without attempts.
    pub completion_rate: f64,
    /// `focus_time / time_on_task`, or 0 without time on task.
    pub focus_ratio: f64,
    /// Weighted combination in `[0, 1]`.
    pub score: f64,
}

/// Cognitive metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitiveMetrics {
    pub accuracy: f64,
    pub reaction_time_ms: f64,
    pub hints_used: f64,
    pub errors: f64,
    /// Accuracy discounted by hint reliance, in `[0, 1]`.
    pub independence: f64,
}

/// Behavioral metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BehavioralMetrics {
    pub frustration_events: f64,
    pub help_requests: f64,
    pub self_corrections: f64,
    pub retries: f64,
    /// Share of setbacks answered by a retry or self-correction, in `[0, 1]`.
    pub persistence: f64,
}

/// Sensory metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensoryMetrics {
    pub visual_responses: f64,
    pub auditory_responses: f64,
    pub tactile_responses: f64,
    pub overload_events: f64,
    pub calming_breaks: f64,
    /// Share of responses that were not overload events, in `[0, 1]`.
    pub regulation: f64,
}

/// The four metric categories for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub engagement: EngagementMetrics,
    pub cognitive: CognitiveMetrics,
    pub behavioral: BehavioralMetrics,
    pub sensory: SensoryMetrics,
}

/// Stateless metrics aggregator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregator;

fn or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        (numerator / denominator).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Map a session payload into metric categories.
    ///
    /// Deterministic: identical input always yields identical output.
    pub fn collect(&self, session: &SessionData) -> SessionMetrics {
        SessionMetrics {
            engagement: self.engagement(session),
            cognitive: self.cognitive(session),
            behavioral: self.behavioral(session),
            sensory: self.sensory(session),
        }
    }

    fn engagement(&self, session: &SessionData) -> EngagementMetrics {
        let p = &session.performance;
        let time_on_task = or_zero(p.time_on_task);
        let interaction_count = or_zero(p.interactions);
        let completion_rate = ratio(or_zero(p.completed), or_zero(p.attempts));
        let focus_ratio = ratio(or_zero(p.focus_time), time_on_task);
        // One interaction every ten seconds counts as fully active.
        let activity = ratio(interaction_count * 10.0, time_on_task);

        EngagementMetrics {
            time_on_task,
            interaction_count,
            completion_rate,
            focus_ratio,
            score: 0.4 * completion_rate + 0.4 * focus_ratio + 0.2 * activity,
        }
    }

    fn cognitive(&self, session: &SessionData) -> CognitiveMetrics {
        let p = &session.performance;
        let accuracy = or_zero(p.accuracy).clamp(0.0, 1.0);
        let hints_used = or_zero(p.hints_used);

        CognitiveMetrics {
            accuracy,
            reaction_time_ms: or_zero(p.reaction_time_ms),
            hints_used,
            errors: or_zero(p.errors),
            independence: accuracy / (1.0 + hints_used),
        }
    }

    fn behavioral(&self, session: &SessionData) -> BehavioralMetrics {
        let p = &session.performance;
        let frustration_events = or_zero(p.frustration_events);
        let self_corrections = or_zero(p.self_corrections);
        let retries = or_zero(p.retries);
        let setbacks = frustration_events + or_zero(p.errors);

        BehavioralMetrics {
            frustration_events,
            help_requests: or_zero(p.help_requests),
            self_corrections,
            retries,
            persistence: ratio(self_corrections + retries, setbacks),
        }
    }

    fn sensory(&self, session: &SessionData) -> SensoryMetrics {
        let s = &session.sensory_data;
        let visual_responses = or_zero(s.visual_responses);
        let auditory_responses = or_zero(s.auditory_responses);
        let tactile_responses = or_zero(s.tactile_responses);
        let overload_events = or_zero(s.overload_events);
        let responses = visual_responses + auditory_responses + tactile_responses;

        SensoryMetrics {
            visual_responses,
            auditory_responses,
            tactile_responses,
            overload_events,
            calming_breaks: or_zero(s.calming_breaks),
            regulation: if responses > 0.0 {
                1.0 - ratio(overload_events, responses)
            } else {
                0.0
            },
        }
    }
}
