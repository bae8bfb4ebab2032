//! Per-event-type handlers
//!
//! `game_end` and `therapeutic_session` run the full pipeline: metrics,
//! analyzers, difficulty, retention, persistence and dashboard projection.
//! Collaborator failures inside the pipeline are recorded and reported in the
//! result; only payload problems and systemic faults fail the event.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use super::runtime::Inner;
use crate::analyzers::{AnalysisReport, AnalyzerResult};
use crate::dashboard::{DashboardView, ProjectionInput};
use crate::difficulty::{DifficultyDecision, DifficultyTier, PerformanceRecord};
use crate::error::{GatewayError, PersistenceError, Result, panic_message};
use crate::events::{Event, EventTag, ProfilePayload, ReviewInput, SessionData};
use crate::metrics::MetricsAggregator;
use crate::persistence::{AnalysisRecord, SessionRecord};
use crate::retention::ReviewPlan;

impl Inner {
    pub(super) async fn dispatch(&self, event: &Event) -> Result<Value> {
        match &event.event_type {
            EventTag::GameStart => self.handle_game_start(event).await,
            EventTag::GameEnd | EventTag::TherapeuticSession => self.handle_session(event).await,
            EventTag::UserInteraction => self.handle_interaction(event).await,
            EventTag::MetricsUpdate => self.handle_metrics_update(event),
            EventTag::SystemOptimization => {
                let report = self.run_optimization_cycle().await?;
                Ok(json!({ "status": "optimization_complete", "report": report }))
            }
            EventTag::ProfileCreated | EventTag::ProfileUpdated => {
                self.handle_profile_update(event).await
            }
            EventTag::ProfileAnalyzed => self.handle_profile_analyzed(event).await,
            EventTag::UserProfileInteraction => self.handle_profile_interaction(event).await,
            EventTag::Unknown(tag) => {
                debug!(event_type = %tag, "Unknown event type");
                Ok(json!({ "status": "unknown_event_type", "type": tag }))
            }
        }
    }

    fn metrics(&self) -> MetricsAggregator {
        self.components.metrics.unwrap_or_default()
    }

    async fn handle_game_start(&self, event: &Event) -> Result<Value> {
        let session = SessionData::from_event_data(&event.data)?;
        let activity_id = session.require_activity()?;
        self.stats.record_session();

        let (tier, predicted_score) = match &self.components.difficulty {
            Some(engine) => (
                engine.recommend_difficulty(&session.user_id, activity_id).await,
                engine.predict_score(&session.user_id, activity_id).await,
            ),
            None => (DifficultyTier::default(), None),
        };

        debug!(user_id = %session.user_id, activity_id, tier = %tier, "Session started");
        Ok(json!({
            "status": "session_started",
            "userId": session.user_id,
            "activityId": activity_id,
            "sessionId": session.session_id,
            "difficulty": tier,
            "predictedScore": predicted_score,
        }))
    }

    async fn handle_session(&self, event: &Event) -> Result<Value> {
        let session = SessionData::from_event_data(&event.data)?;
        if session.is_scored_attempt() {
            session.require_activity()?;
        }
        if event.event_type == EventTag::TherapeuticSession {
            self.stats.record_session();
        }
        let user_id = session.user_id.as_str();

        let metrics = self.metrics().collect(&session);
        let profile = self.load_profile(user_id).await;
        let (results, report) = self.analyze(user_id, &session, profile.as_ref()).await;
        let difficulty = self.score_attempt(&session, event.timestamp).await?;
        let reviews = self
            .apply_reviews(user_id, &session.reviews, event.timestamp)
            .await;

        let history = match (&self.components.difficulty, &difficulty) {
            (Some(engine), Some(_)) => engine.history(user_id, &session.activity_id).await,
            _ => None,
        };

        let session_record = SessionRecord {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            activity_id: session.activity_id.clone(),
            session_id: session.session_id.clone(),
            event_type: event.event_type.to_string(),
            metrics,
            difficulty,
            reviews,
            recorded_at: event.timestamp,
        };
        let analysis_record = AnalysisRecord {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            session_id: session.session_id.clone(),
            results,
            report,
            recorded_at: event.timestamp,
        };
        let persistence = match self.persist(&session_record, &analysis_record).await {
            Some(errors) => json!({
                "configured": true,
                "saved": errors.is_empty(),
                "errors": errors,
            }),
            None => json!({ "configured": false, "saved": false, "errors": [] }),
        };

        let view = DashboardView::build(ProjectionInput {
            user_id,
            activity_id: &session_record.activity_id,
            event_type: event.event_type.as_str(),
            metrics: &session_record.metrics,
            report: &analysis_record.report,
            difficulty: session_record.difficulty.as_ref(),
            history: history.as_ref(),
            reviews: &session_record.reviews,
        });
        let projected = self.project(&view).await;

        Ok(json!({
            "status": "processed",
            "userId": user_id,
            "activityId": session_record.activity_id,
            "sessionId": session_record.session_id,
            "metrics": session_record.metrics,
            "analysis": {
                "results": analysis_record.results,
                "report": analysis_record.report,
            },
            "difficulty": session_record.difficulty,
            "reviews": session_record.reviews,
            "persistence": persistence,
            "dashboard": { "projected": projected },
        }))
    }

    async fn handle_interaction(&self, event: &Event) -> Result<Value> {
        let session = SessionData::from_event_data(&event.data)?;
        if session.is_scored_attempt() {
            session.require_activity()?;
        }

        let difficulty = self.score_attempt(&session, event.timestamp).await?;
        let reviews = self
            .apply_reviews(&session.user_id, &session.reviews, event.timestamp)
            .await;

        Ok(json!({
            "status": "interaction_recorded",
            "userId": session.user_id,
            "activityId": session.activity_id,
            "difficulty": difficulty,
            "reviews": reviews,
        }))
    }

    fn handle_metrics_update(&self, event: &Event) -> Result<Value> {
        let session = SessionData::from_event_data(&event.data)?;
        let metrics = self.metrics().collect(&session);
        Ok(json!({
            "status": "metrics_collected",
            "userId": session.user_id,
            "metrics": metrics,
        }))
    }

    async fn handle_profile_update(&self, event: &Event) -> Result<Value> {
        let payload = ProfilePayload::from_event_data(&event.data)?;
        let persistence = self
            .components
            .persistence
            .as_ref()
            .ok_or(PersistenceError::NotConfigured)?;

        if let Err(e) = persistence
            .update_profile(&payload.user_id, &payload.profile)
            .await
        {
            self.collaborators.set_persistence(false);
            return Err(e.into());
        }
        self.collaborators.set_persistence(true);

        let reviews = self
            .apply_reviews(&payload.user_id, &payload.reviews, event.timestamp)
            .await;
        Ok(json!({
            "status": "profile_saved",
            "userId": payload.user_id,
            "reviews": reviews,
        }))
    }

    async fn handle_profile_analyzed(&self, event: &Event) -> Result<Value> {
        let session = SessionData::from_event_data(&event.data)?;
        let profile = match event.data.get("profile").filter(|p| !p.is_null()) {
            Some(profile) => Some(profile.clone()),
            None => self.load_profile(&session.user_id).await,
        };

        let (results, report) = self
            .analyze(&session.user_id, &session, profile.as_ref())
            .await;
        Ok(json!({
            "status": "profile_analyzed",
            "userId": session.user_id,
            "profileFound": profile.is_some(),
            "analysis": { "results": results, "report": report },
        }))
    }

    async fn handle_profile_interaction(&self, event: &Event) -> Result<Value> {
        let payload = ProfilePayload::from_event_data(&event.data)?;
        let reviews = self
            .apply_reviews(&payload.user_id, &payload.reviews, event.timestamp)
            .await;
        Ok(json!({
            "status": "reviews_recorded",
            "userId": payload.user_id,
            "reviews": reviews,
        }))
    }

    /// Stored profile for a user. Lookup failures degrade to `None`.
    async fn load_profile(&self, user_id: &str) -> Option<Value> {
        let persistence = self.components.persistence.as_ref()?;
        match persistence.get_profile(user_id).await {
            Ok(profile) => {
                self.collaborators.set_persistence(true);
                profile
            }
            Err(e) => {
                warn!(user_id, error = %e, "Profile lookup failed, analyzing without profile");
                self.stats.record_persistence_failure();
                self.collaborators.set_persistence(false);
                None
            }
        }
    }

    async fn analyze(
        &self,
        user_id: &str,
        session: &SessionData,
        profile: Option<&Value>,
    ) -> (BTreeMap<String, AnalyzerResult>, AnalysisReport) {
        let results = match &self.components.analyzers {
            Some(registry) => registry.run_all(user_id, session, profile).await,
            None => BTreeMap::new(),
        };
        let report = AnalysisReport::consolidate(&results);

        if !report.failed.is_empty() {
            warn!(user_id, failed = ?report.failed.keys().collect::<Vec<_>>(), "Analyzers failed");
            self.stats
                .record_collaborator_failures(report.failed.len() as u64);
        }
        (results, report)
    }

    /// Feed a scored attempt into the difficulty engine.
    async fn score_attempt(
        &self,
        session: &SessionData,
        at: DateTime<Utc>,
    ) -> Result<Option<DifficultyDecision>> {
        let Some(accuracy) = session.performance.accuracy else {
            return Ok(None);
        };
        let Some(engine) = &self.components.difficulty else {
            return Ok(None);
        };
        let activity_id = session.require_activity()?;
        let performance = &session.performance;

        let tier = match performance.difficulty {
            Some(tier) => tier,
            None => engine.recommend_difficulty(&session.user_id, activity_id).await,
        };
        let record = PerformanceRecord::new(tier, accuracy)
            .with_completion_time(performance.completion_time.unwrap_or_default())
            .with_hints(performance.hints_used.unwrap_or_default().round() as u32)
            .at(at);

        Ok(Some(engine.update(&session.user_id, activity_id, record).await))
    }

    async fn apply_reviews(
        &self,
        user_id: &str,
        reviews: &[ReviewInput],
        at: DateTime<Utc>,
    ) -> Vec<ReviewPlan> {
        let Some(scheduler) = &self.components.retention else {
            return Vec::new();
        };
        let mut plans = Vec::with_capacity(reviews.len());
        for review in reviews {
            plans.push(scheduler.update(user_id, review, at).await);
        }
        plans
    }

    /// Save the session and its analysis. `None` when no gateway is configured.
    async fn persist(
        &self,
        session: &SessionRecord,
        analysis: &AnalysisRecord,
    ) -> Option<Vec<String>> {
        let persistence = self.components.persistence.as_ref()?;

        let mut errors = Vec::new();
        if let Err(e) = persistence.save_game_session(session).await {
            errors.push(e.to_string());
        }
        if let Err(e) = persistence.save_analysis_results(analysis).await {
            errors.push(e.to_string());
        }

        for error in &errors {
            warn!(user_id = %session.user_id, error = %error, "Failed to persist session output");
            self.stats.record_persistence_failure();
        }
        self.collaborators.set_persistence(errors.is_empty());
        Some(errors)
    }

    /// Publish a view. Errors, panics and timeouts are collaborator failures.
    async fn project(&self, view: &DashboardView) -> bool {
        let Some(projector) = &self.components.dashboard else {
            return false;
        };
        let timeout = self.config.dashboard.timeout();
        let call = AssertUnwindSafe(projector.project(view)).catch_unwind();
        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(GatewayError::new(format!(
                "projector panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(GatewayError::new(format!(
                "projection timed out after {} ms",
                timeout.as_millis()
            ))),
        };
        match outcome {
            Ok(()) => {
                self.collaborators.set_dashboard(true);
                true
            }
            Err(e) => {
                warn!(user_id = %view.user_id, error = %e, "Dashboard projection failed");
                self.stats.record_collaborator_failures(1);
                self.collaborators.set_dashboard(false);
                false
            }
        }
    }
}
