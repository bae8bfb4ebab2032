//! Dashboard view types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzers::AnalysisReport;
use crate::difficulty::{DifficultyDecision, DifficultyTier, RollingHistory};
use crate::metrics::SessionMetrics;
use crate::retention::ReviewPlan;

/// Engagement score below which an alert is raised.
const LOW_ENGAGEMENT: f64 = 0.3;
/// Sensory regulation below which an alert is raised.
const LOW_REGULATION: f64 = 0.5;
/// Slope magnitude treated as flat.
const FLAT_TREND: f64 = 0.02;

/// Direction of recent performance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    #[default]
    Stable,
    Falling,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > FLAT_TREND {
            Self::Rising
        } else if slope < -FLAT_TREND {
            Self::Falling
        } else {
            Self::Stable
        }
    }
}

/// Headline figures
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub activity_id: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<DifficultyTier>,
    pub difficulty_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_score: Option<f64>,
    pub trend: TrendDirection,
    pub analyzers_succeeded: usize,
    pub analyzers_failed: usize,
    /// Earliest scheduled review among this event's items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chart {
    pub id: String,
    pub title: String,
    pub kind: ChartKind,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
}

/// Everything a dashboard renders for one processed session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub user_id: String,
    pub summary: DashboardSummary,
    pub metrics: SessionMetrics,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub charts: Vec<Chart>,
    pub alerts: Vec<Alert>,
    pub generated_at: DateTime<Utc>,
}

/// Inputs gathered while processing one session.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionInput<'a> {
    pub user_id: &'a str,
    pub activity_id: &'a str,
    pub event_type: &'a str,
    pub metrics: &'a SessionMetrics,
    pub report: &'a AnalysisReport,
    pub difficulty: Option<&'a DifficultyDecision>,
    pub history: Option<&'a RollingHistory>,
    pub reviews: &'a [ReviewPlan],
}

impl DashboardView {
    pub fn build(input: ProjectionInput<'_>) -> Self {
        let metrics = *input.metrics;
        let decision = input.difficulty;

        let summary = DashboardSummary {
            activity_id: input.activity_id.to_string(),
            event_type: input.event_type.to_string(),
            difficulty: decision.map(|d| d.tier),
            difficulty_changed: decision.is_some_and(|d| d.changed),
            predicted_score: decision.and_then(|d| d.predicted_score),
            trend: decision
                .and_then(|d| d.trend)
                .map(TrendDirection::from_slope)
                .unwrap_or_default(),
            analyzers_succeeded: input.report.succeeded.len(),
            analyzers_failed: input.report.failed.len(),
            next_review_at: input.reviews.iter().map(|r| r.next_review_at).min(),
        };

        Self {
            user_id: input.user_id.to_string(),
            summary,
            metrics,
            insights: input.report.insights.clone(),
            recommendations: input.report.recommendations.clone(),
            charts: charts(&metrics, input.history),
            alerts: alerts(&metrics, input.report, decision),
            generated_at: Utc::now(),
        }
    }
}

fn point(label: &str, value: f64) -> ChartPoint {
    ChartPoint {
        label: label.to_string(),
        value,
    }
}

fn charts(metrics: &SessionMetrics, history: Option<&RollingHistory>) -> Vec<Chart> {
    let mut charts = vec![Chart {
        id: "session-profile".to_string(),
        title: "Session profile".to_string(),
        kind: ChartKind::Bar,
        points: vec![
            point("engagement", metrics.engagement.score),
            point("accuracy", metrics.cognitive.accuracy),
            point("independence", metrics.cognitive.independence),
            point("persistence", metrics.behavioral.persistence),
            point("regulation", metrics.sensory.regulation),
        ],
    }];

    if let Some(history) = history
        && !history.is_empty()
    {
        charts.push(Chart {
            id: "accuracy-history".to_string(),
            title: "Recent accuracy".to_string(),
            kind: ChartKind::Line,
            points: history
                .iter()
                .map(|r| point(&r.timestamp.to_rfc3339(), r.accuracy))
                .collect(),
        });
    }

    charts
}

fn alerts(
    metrics: &SessionMetrics,
    report: &AnalysisReport,
    decision: Option<&DifficultyDecision>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if metrics.engagement.time_on_task > 0.0 && metrics.engagement.score < LOW_ENGAGEMENT {
        alerts.push(Alert {
            severity: AlertSeverity::Warning,
            message: "Engagement was low this session".to_string(),
        });
    }
    if metrics.sensory.overload_events > 0.0 && metrics.sensory.regulation < LOW_REGULATION {
        alerts.push(Alert {
            severity: AlertSeverity::Critical,
            message: "Frequent sensory overload".to_string(),
        });
    }
    if let Some(d) = decision
        && d.changed
    {
        alerts.push(Alert {
            severity: AlertSeverity::Info,
            message: format!("Difficulty moved from {} to {}", d.previous_tier, d.tier),
        });
    }
    for (name, reason) in &report.failed {
        alerts.push(Alert {
            severity: AlertSeverity::Warning,
            message: format!("Analyzer {name} failed: {reason}"),
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn decision(changed: bool) -> DifficultyDecision {
        DifficultyDecision {
            previous_tier: DifficultyTier::Medium,
            tier: if changed {
                DifficultyTier::Hard
            } else {
                DifficultyTier::Medium
            },
            changed,
            history_len: 3,
            evicted: false,
            average_accuracy: Some(0.85),
            trend: Some(0.05),
            predicted_score: Some(95.0),
        }
    }

    fn input<'a>(
        metrics: &'a SessionMetrics,
        report: &'a AnalysisReport,
        difficulty: Option<&'a DifficultyDecision>,
    ) -> ProjectionInput<'a> {
        ProjectionInput {
            user_id: "u1",
            activity_id: "memory-match",
            event_type: "game_end",
            metrics,
            report,
            difficulty,
            history: None,
            reviews: &[],
        }
    }

    #[test]
    fn empty_inputs_build_a_quiet_view() {
        let metrics = SessionMetrics::default();
        let report = AnalysisReport::default();
        let view = DashboardView::build(input(&metrics, &report, None));

        assert_eq!(view.summary.difficulty, None);
        assert_eq!(view.summary.trend, TrendDirection::Stable);
        assert!(view.alerts.is_empty());
        assert_eq!(view.charts.len(), 1);
    }

    #[test]
    fn tier_change_and_analyzer_failure_raise_alerts() {
        let metrics = SessionMetrics::default();
        let report = AnalysisReport {
            analyzers_run: 2,
            succeeded: vec!["engagement".into()],
            failed: BTreeMap::from([("sensory".to_string(), "timed out".to_string())]),
            ..Default::default()
        };
        let d = decision(true);
        let view = DashboardView::build(input(&metrics, &report, Some(&d)));

        assert_eq!(view.summary.difficulty, Some(DifficultyTier::Hard));
        assert!(view.summary.difficulty_changed);
        assert_eq!(view.summary.trend, TrendDirection::Rising);
        assert_eq!(view.summary.analyzers_failed, 1);
        assert_eq!(view.alerts.len(), 2);
        assert!(view.alerts[0].message.contains("MEDIUM to HARD"));
    }

    #[test]
    fn view_serializes_dashboard_sections() {
        let metrics = SessionMetrics::default();
        let report = AnalysisReport::default();
        let value = serde_json::to_value(DashboardView::build(input(&metrics, &report, None))).unwrap();
        for key in ["summary", "metrics", "insights", "recommendations", "charts", "alerts"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        for key in ["engagement", "cognitive", "behavioral", "sensory"] {
            assert!(value["metrics"].get(key).is_some(), "missing metrics.{key}");
        }
    }
}
