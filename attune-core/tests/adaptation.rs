//! End-to-end adaptation tests
//!
//! Drives difficulty and retention through orchestrator events and checks the
//! observable guarantees: tier hysteresis, bounded history, growing review
//! intervals and bounded lapse intervals.

use std::sync::Arc;

use attune_core::{
    AttuneConfig, Event, InMemoryGateway, Orchestrator, RetentionConfig, RetentionScheduler,
    ReviewInput,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};

async fn orchestrator() -> Orchestrator {
    let orchestrator = Orchestrator::builder(AttuneConfig::default())
        .with_builtin_analyzers()
        .with_gateway(Arc::new(InMemoryGateway::new()))
        .with_background_tasks(false)
        .build()
        .await;
    orchestrator.initialize().await.unwrap();
    orchestrator
}

async fn play(orchestrator: &Orchestrator, accuracy: f64) -> Value {
    let performance = json!({ "accuracy": accuracy });
    let response = orchestrator
        .process_event(Event::new(
            "game_end",
            json!({ "userId": "u1", "activityId": "sorting", "performance": performance }),
        ))
        .await;
    assert!(response.success, "{:?}", response.error);
    response.result.unwrap()
}

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-05T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn declining_accuracy_drops_to_easy() {
    let orchestrator = orchestrator().await;

    play(&orchestrator, 0.50).await;
    play(&orchestrator, 0.45).await;
    let result = play(&orchestrator, 0.30).await;

    assert_eq!(result["difficulty"]["previous_tier"], "MEDIUM");
    assert_eq!(result["difficulty"]["tier"], "EASY");
    assert_eq!(result["difficulty"]["changed"], true);
}

#[tokio::test]
async fn strong_play_on_easy_climbs_back_to_medium() {
    let orchestrator = orchestrator().await;

    for _ in 0..3 {
        play(&orchestrator, 0.20).await;
    }
    let engine = orchestrator.difficulty().unwrap();
    assert_eq!(
        engine.recommend_difficulty("u1", "sorting").await.to_string(),
        "EASY"
    );

    // The window average only clears the up-threshold on the sixth strong run.
    let mut tiers = Vec::new();
    for _ in 0..6 {
        let result = play(&orchestrator, 0.96).await;
        tiers.push(result["difficulty"]["tier"].as_str().unwrap().to_string());
    }
    assert_eq!(tiers, ["EASY", "EASY", "EASY", "EASY", "EASY", "MEDIUM"]);
}

#[tokio::test]
async fn oscillation_near_threshold_does_not_flip() {
    let orchestrator = orchestrator().await;
    for accuracy in [0.69, 0.71, 0.69, 0.71, 0.69, 0.71, 0.69, 0.71] {
        let result = play(&orchestrator, accuracy).await;
        assert_eq!(result["difficulty"]["tier"], "MEDIUM");
    }
}

#[tokio::test]
async fn history_is_bounded_and_prediction_in_range() {
    let orchestrator = orchestrator().await;

    let first = play(&orchestrator, 0.6).await;
    assert!(first["difficulty"].get("predicted_score").is_none());

    let mut last = Value::Null;
    for i in 0..15 {
        last = play(&orchestrator, 0.5 + f64::from(i % 5) * 0.1).await;
    }

    assert_eq!(last["difficulty"]["history_len"], 10);
    assert_eq!(last["difficulty"]["evicted"], true);
    let predicted = last["difficulty"]["predicted_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&predicted));
}

#[tokio::test]
async fn successful_reviews_stretch_and_lapses_shrink() {
    let scheduler = RetentionScheduler::new(RetentionConfig::default());
    let mut at = start();
    let mut intervals = Vec::new();

    for _ in 0..6 {
        let plan = scheduler
            .update(
                "u1",
                &ReviewInput {
                    item_id: "shapes".into(),
                    recalled: true,
                    score: None,
                    elapsed_days: None,
                },
                at,
            )
            .await;
        assert!(plan.next_review_at > at);
        assert!((0.0..=1.0).contains(&plan.predicted_retention));
        intervals.push(plan.interval_days);
        at = plan.next_review_at;
    }
    assert!(intervals.windows(2).all(|w| w[1] > w[0]), "{intervals:?}");

    let lapse = scheduler
        .update(
            "u1",
            &ReviewInput {
                item_id: "shapes".into(),
                recalled: false,
                score: Some(0.1),
                elapsed_days: None,
            },
            at,
        )
        .await;
    let last_success = *intervals.last().unwrap();
    assert!(lapse.interval_days <= last_success);
    assert_eq!(lapse.streak, 0);

    let profile = scheduler.profile("u1", "shapes").await.unwrap();
    assert_eq!(profile.review_count, 7);
    assert_eq!(profile.lapses, 1);
    // Mostly recalled across multi-day gaps.
    assert!(profile.interference_resistance > 1.0);
}

#[tokio::test]
async fn review_events_reach_the_scheduler() {
    let orchestrator = orchestrator().await;
    let at = start();

    let response = orchestrator
        .process_event(
            Event::new(
                "user_profile_interaction",
                json!({
                    "userId": "u1",
                    "reviews": [
                        { "itemId": "colors", "recalled": true },
                        { "itemId": "numbers", "recalled": false, "score": 0.2 },
                    ],
                }),
            )
            .at(at),
        )
        .await;
    assert!(response.success, "{:?}", response.error);
    let reviews = response.result.unwrap()["reviews"].clone();
    assert_eq!(reviews.as_array().unwrap().len(), 2);

    let retention = orchestrator.retention().unwrap();
    let colors = retention.profile("u1", "colors").await.unwrap();
    assert_eq!(colors.streak, 1);
    assert!(colors.next_review_at.unwrap() >= at + Duration::hours(12));
    assert_eq!(retention.item_count().await, 2);
}
