//! Built-in analyzers derived from session metrics.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::Analyzer;
use crate::error::AnalyzerError;
use crate::events::SessionData;
use crate::metrics::MetricsAggregator;

fn level(score: f64, high: f64, low: f64) -> &'static str {
    if score >= high {
        "high"
    } else if score < low {
        "low"
    } else {
        "moderate"
    }
}

/// Scores attention and participation.
#[derive(Debug, Default)]
pub struct EngagementAnalyzer {
    metrics: MetricsAggregator,
}

impl EngagementAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Analyzer for EngagementAnalyzer {
    async fn analyze(
        &self,
        _user_id: &str,
        session: &SessionData,
        _profile: Option<&Value>,
    ) -> Result<Value, AnalyzerError> {
        let metrics = self.metrics.collect(session);
        let engagement = metrics.engagement;
        let behavioral = metrics.behavioral;

        let mut insights = Vec::new();
        let mut recommendations = Vec::new();

        if engagement.focus_ratio >= 0.8 {
            insights.push("Sustained focus throughout the session");
        } else if engagement.time_on_task > 0.0 && engagement.focus_ratio < 0.4 {
            insights.push("Attention drifted for most of the session");
            recommendations.push("Shorten activities or add movement breaks");
        }
        if behavioral.frustration_events > behavioral.self_corrections + behavioral.retries {
            insights.push("Frustration outweighed recovery attempts");
            recommendations.push("Offer encouragement and scaffolded hints earlier");
        } else if behavioral.persistence >= 0.5 {
            insights.push("Recovered well from setbacks");
        }

        Ok(json!({
            "score": engagement.score,
            "level": level(engagement.score, 0.7, 0.4),
            "focusRatio": engagement.focus_ratio,
            "completionRate": engagement.completion_rate,
            "persistence": behavioral.persistence,
            "insights": insights,
            "recommendations": recommendations,
        }))
    }
}

/// Tracks sensory load and self-regulation.
#[derive(Debug, Default)]
pub struct SensoryRegulationAnalyzer {
    metrics: MetricsAggregator,
}

impl SensoryRegulationAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Analyzer for SensoryRegulationAnalyzer {
    async fn analyze(
        &self,
        _user_id: &str,
        session: &SessionData,
        _profile: Option<&Value>,
    ) -> Result<Value, AnalyzerError> {
        let sensory = self.metrics.collect(session).sensory;
        let channels = [
            ("visual", sensory.visual_responses),
            ("auditory", sensory.auditory_responses),
            ("tactile", sensory.tactile_responses),
        ];
        let responses: f64 = channels.iter().map(|(_, n)| n).sum();

        let dominant = channels
            .iter()
            .filter(|(_, n)| *n > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| *name);

        let mut insights = Vec::new();
        let mut recommendations = Vec::new();

        if responses == 0.0 {
            insights.push("No sensory responses recorded".to_string());
        } else {
            if let Some(channel) = dominant {
                insights.push(format!("Responds most to {channel} input"));
            }
            if sensory.regulation < 0.5 {
                recommendations.push("Reduce stimulus intensity and plan calming breaks".to_string());
            }
            if sensory.overload_events > 0.0 && sensory.calming_breaks == 0.0 {
                recommendations.push("Introduce a calming break after overload".to_string());
            }
        }

        Ok(json!({
            "regulation": sensory.regulation,
            "level": level(sensory.regulation, 0.8, 0.5),
            "overloadEvents": sensory.overload_events,
            "dominantChannel": dominant,
            "insights": insights,
            "recommendations": recommendations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{PerformanceData, SensoryData};

    #[tokio::test]
    async fn engagement_flags_low_focus() {
        let session = SessionData {
            user_id: "u1".into(),
            performance: PerformanceData {
                time_on_task: Some(100.0),
                focus_time: Some(20.0),
                frustration_events: Some(3.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = EngagementAnalyzer::new()
            .analyze("u1", &session, None)
            .await
            .unwrap();
        assert_eq!(result["level"], "low");
        assert_eq!(result["recommendations"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sensory_reports_dominant_channel_and_overload() {
        let session = SessionData {
            user_id: "u1".into(),
            sensory_data: SensoryData {
                visual_responses: Some(2.0),
                auditory_responses: Some(6.0),
                overload_events: Some(5.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = SensoryRegulationAnalyzer::new()
            .analyze("u1", &session, None)
            .await
            .unwrap();
        assert_eq!(result["dominantChannel"], "auditory");
        assert_eq!(result["level"], "low");
        assert_eq!(result["recommendations"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sensory_handles_empty_session() {
        let result = SensoryRegulationAnalyzer::new()
            .analyze("u1", &SessionData::default(), None)
            .await
            .unwrap();
        assert_eq!(result["dominantChannel"], Value::Null);
        assert_eq!(result["regulation"], 0.0);
    }
}
