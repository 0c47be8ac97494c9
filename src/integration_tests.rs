//! End-to-end engine tests over the in-memory store and scripted gateway.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::engine::{run_sentiment_pass, Engine, NewGoal};
use crate::error::{kind_of, EngineErrorKind};
use crate::gateway::{
    DailyGuidance, GoalAdvice, GoalAnalysis, QuizAnalysis, SentimentAnalysis, FALLBACK_REPLY,
};
use crate::store::{DailyRecordStore, GoalStore, ProfileStore, ThreadStore};
use crate::testing::{GatewayCall, MemoryStore, MockGateway};
use crate::types::{
    ConversationStyle, DailyMetrics, DailyRecord, EmotionScore, GoalStatus, Insight, MessageKind,
    OverallTrend, Priority, QuizType, Sentiment, Significance, TopicScore,
};

/// Engine log output in tests, opt-in through `RUST_LOG`.
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn build_engine() -> (Engine, Arc<MemoryStore>, Arc<MockGateway>) {
    init_test_tracing();
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::new());
    let engine = Engine::new(store.clone(), gateway.clone(), EngineConfig::default());
    (engine, store, gateway)
}

fn failing_engine() -> (Engine, Arc<MemoryStore>, Arc<MockGateway>) {
    init_test_tracing();
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::failing());
    let engine = Engine::new(store.clone(), gateway.clone(), EngineConfig::default());
    (engine, store, gateway)
}

fn days_ago(n: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(n)
}

fn metrics(mood: u8, energy: u8, stress: u8) -> DailyMetrics {
    DailyMetrics {
        mood,
        energy,
        stress,
        productivity: None,
        sleep_quality: None,
        note: None,
    }
}

fn quiz_answers(stress_response: &str) -> BTreeMap<String, Value> {
    [
        ("comfort_alone".to_string(), json!(4)),
        ("stress_response".to_string(), json!(stress_response)),
        (
            "difficult_decision".to_string(),
            json!("I listed what mattered and slept on it"),
        ),
    ]
    .into_iter()
    .collect()
}

// -- daily metrics ----------------------------------------------------------

#[tokio::test]
async fn recording_metrics_computes_wellbeing_and_attaches_guidance() {
    let (engine, _store, _gateway) = build_engine();
    let record = engine
        .record_daily_metrics("u1", days_ago(0), metrics(8, 7, 3))
        .await
        .unwrap();
    assert_eq!(record.wellbeing, crate::scores::wellbeing(8, 7, 3));
    assert_eq!(record.insights.len(), 1);
    assert_eq!(record.recommendations.len(), 1);
    assert_eq!(record.insights[0].kind, "daily_reflection");
}

#[tokio::test]
async fn resubmitting_same_day_updates_in_place() {
    let (engine, store, _gateway) = build_engine();
    let day = days_ago(0);
    engine
        .record_daily_metrics("u1", day, metrics(8, 7, 3))
        .await
        .unwrap();
    let updated = engine
        .record_daily_metrics("u1", day, metrics(3, 4, 8))
        .await
        .unwrap();
    assert_eq!(updated.mood, 3);
    assert_eq!(updated.wellbeing, crate::scores::wellbeing(3, 4, 8));

    let stored = store.get_daily_record("u1", day).await.unwrap().unwrap();
    assert_eq!(stored.mood, 3);
    // one record, not two
    let all = store.get_daily_range("u1", day, day).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn daily_ledgers_stay_capped() {
    let (engine, _store, gateway) = build_engine();
    gateway
        .script_daily_guidance(DailyGuidance {
            insights: (0..8).map(|i| format!("insight {i}")).collect(),
            recommendations: (0..6).map(|i| format!("rec {i}")).collect(),
            motivation: String::new(),
        })
        .await;
    let record = engine
        .record_daily_metrics("u1", days_ago(0), metrics(6, 6, 5))
        .await
        .unwrap();
    assert_eq!(record.insights.len(), 5);
    assert_eq!(record.recommendations.len(), 3);
    // newest entries survive the cap
    assert_eq!(record.insights[4].message, "insight 7");
    assert_eq!(record.recommendations[2].description, "rec 5");
}

#[tokio::test]
async fn gateway_failure_still_records_metrics_with_fallback_guidance() {
    let (engine, _store, _gateway) = failing_engine();
    let record = engine
        .record_daily_metrics("u1", days_ago(0), metrics(5, 5, 5))
        .await
        .unwrap();
    assert_eq!(record.wellbeing, crate::scores::wellbeing(5, 5, 5));
    assert!(!record.insights.is_empty());
    assert!(!record.recommendations.is_empty());
}

#[tokio::test]
async fn out_of_scale_metrics_are_rejected() {
    let (engine, _store, _gateway) = build_engine();
    let err = engine
        .record_daily_metrics("u1", days_ago(0), metrics(0, 5, 5))
        .await
        .unwrap_err();
    assert_eq!(kind_of(&err), Some(EngineErrorKind::Validation));
}

// -- conversation -----------------------------------------------------------

#[tokio::test]
async fn chat_turn_persists_both_messages_with_metadata() {
    let (engine, store, gateway) = build_engine();
    gateway.script_reply_text("Good to hear from you.").await;

    let (thread, _) = engine.start_thread("u1", "Check-in", None).await.unwrap();
    let exchange = engine
        .send_message("u1", &thread.id, "Feeling pretty good today")
        .await
        .unwrap();

    assert_eq!(exchange.user_message.kind, MessageKind::User);
    assert_eq!(exchange.ai_message.kind, MessageKind::Ai);
    assert_eq!(exchange.ai_message.content, "Good to hear from you.");
    assert_eq!(exchange.ai_message.model.as_deref(), Some("mock-model"));
    assert!(exchange.ai_message.latency_ms.is_some());

    let stored = store.get_messages(&thread.id, 20).await.unwrap();
    assert_eq!(stored.len(), 2);

    let thread = store.get_thread(&thread.id).await.unwrap().unwrap();
    assert_eq!(thread.message_count, 2);
    assert!(thread.last_message_at.is_some());

    let profile = store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.stats.total_messages, 2);
}

#[tokio::test]
async fn system_prompt_carries_the_users_conversation_style() {
    let (engine, _store, gateway) = build_engine();
    engine
        .submit_quiz("u1", QuizType::Personality, quiz_answers("seek_support"), None)
        .await
        .unwrap();

    let (thread, _) = engine.start_thread("u1", "Chat", None).await.unwrap();
    engine.send_message("u1", &thread.id, "hi").await.unwrap();

    let calls = gateway.calls().await;
    let prompt = calls
        .iter()
        .find_map(|c| match c {
            GatewayCall::GenerateReply { system_prompt, .. } => Some(system_prompt.clone()),
            _ => None,
        })
        .unwrap();
    assert!(prompt.contains(ConversationStyle::Supportive.instruction()));
}

#[tokio::test]
async fn gateway_failure_yields_the_fixed_fallback_reply() {
    let (engine, store, _gateway) = failing_engine();
    let (thread, _) = engine.start_thread("u1", "Chat", None).await.unwrap();
    let exchange = engine
        .send_message("u1", &thread.id, "anyone there?")
        .await
        .unwrap();
    assert_eq!(exchange.ai_message.content, FALLBACK_REPLY);
    assert_eq!(exchange.ai_message.model.as_deref(), Some("fallback"));

    // the turn still persisted both messages
    let stored = store.get_messages(&thread.id, 20).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn start_thread_with_initial_message_runs_first_exchange() {
    let (engine, _store, _gateway) = build_engine();
    let (thread, exchange) = engine
        .start_thread("u1", "First", Some("hello"))
        .await
        .unwrap();
    assert!(exchange.is_some());
    assert_eq!(thread.message_count, 2);
}

#[tokio::test]
async fn sending_to_another_users_thread_is_not_found() {
    let (engine, _store, _gateway) = build_engine();
    let (thread, _) = engine.start_thread("u1", "Private", None).await.unwrap();
    let err = engine
        .send_message("intruder", &thread.id, "hi")
        .await
        .unwrap_err();
    assert_eq!(kind_of(&err), Some(EngineErrorKind::NotFound));
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let (engine, _store, _gateway) = build_engine();
    let (thread, _) = engine.start_thread("u1", "Chat", None).await.unwrap();
    let err = engine.send_message("u1", &thread.id, "   ").await.unwrap_err();
    assert_eq!(kind_of(&err), Some(EngineErrorKind::Validation));
}

#[tokio::test]
async fn sentiment_pass_attaches_analysis_to_the_message() {
    let (engine, store, gateway) = build_engine();
    let (thread, _) = engine.start_thread("u1", "Chat", None).await.unwrap();
    let exchange = engine
        .send_message("u1", &thread.id, "long week at work")
        .await
        .unwrap();

    // run the pass directly instead of racing the spawned task
    run_sentiment_pass(
        store.clone(),
        gateway.clone(),
        exchange.user_message.id.clone(),
        thread.id.clone(),
        exchange.user_message.content.clone(),
    )
    .await;

    let messages = store.get_messages(&thread.id, 20).await.unwrap();
    let user_message = messages
        .iter()
        .find(|m| m.id == exchange.user_message.id)
        .unwrap();
    assert!(user_message.sentiment.is_some());
    assert!(!user_message.emotions.is_empty());
}

#[tokio::test]
async fn high_urgency_sentiment_flags_the_thread() {
    let (engine, store, gateway) = build_engine();
    let urgent = SentimentAnalysis {
        sentiment: Sentiment {
            score: -0.9,
            label: "negative".to_string(),
        },
        emotions: vec![EmotionScore {
            name: "distress".to_string(),
            confidence: 0.9,
        }],
        topics: vec![TopicScore {
            name: "crisis".to_string(),
            relevance: 0.9,
        }],
        urgency: Priority::High,
        needs_follow_up: true,
    };
    // scripted twice: once for the pass spawned by send_message, once for
    // the direct pass below, so the outcome does not depend on task order
    gateway.script_sentiment(urgent.clone()).await;
    gateway.script_sentiment(urgent).await;

    let (thread, _) = engine.start_thread("u1", "Chat", None).await.unwrap();
    let exchange = engine
        .send_message("u1", &thread.id, "everything is falling apart")
        .await
        .unwrap();
    run_sentiment_pass(
        store.clone(),
        gateway.clone(),
        exchange.user_message.id.clone(),
        thread.id.clone(),
        exchange.user_message.content.clone(),
    )
    .await;

    let thread = store.get_thread(&thread.id).await.unwrap().unwrap();
    assert!(thread.needs_follow_up);
    assert_eq!(thread.risk_flags, vec!["urgent".to_string()]);
}

#[tokio::test]
async fn failed_sentiment_analysis_degrades_to_neutral() {
    let (engine, store, gateway) = build_engine();
    let (thread, _) = engine.start_thread("u1", "Chat", None).await.unwrap();
    // failing before the send so the spawned pass degrades the same way
    gateway.set_failing(true);
    let exchange = engine.send_message("u1", &thread.id, "hi").await.unwrap();

    run_sentiment_pass(
        store.clone(),
        gateway.clone(),
        exchange.user_message.id.clone(),
        thread.id.clone(),
        exchange.user_message.content.clone(),
    )
    .await;

    let messages = store.get_messages(&thread.id, 20).await.unwrap();
    let user_message = messages
        .iter()
        .find(|m| m.id == exchange.user_message.id)
        .unwrap();
    let sentiment = user_message.sentiment.as_ref().unwrap();
    assert_eq!(sentiment.label, "neutral");
    assert_eq!(sentiment.score, 0.0);

    let thread = store.get_thread(&thread.id).await.unwrap().unwrap();
    assert!(!thread.needs_follow_up);
}

// -- quizzes ----------------------------------------------------------------

#[tokio::test]
async fn first_quiz_take_has_scores_but_no_comparison() {
    let (engine, _store, gateway) = build_engine();
    let result = engine
        .submit_quiz("u1", QuizType::Personality, quiz_answers("exercise"), Some(90))
        .await
        .unwrap();

    assert_eq!(result.scores.get("social_comfort"), Some(&8.0));
    assert_eq!(result.scores.get("stress_management"), Some(&7.0));
    assert!(result.comparison.is_none());
    assert_eq!(result.rules_version, "v1");
    assert_eq!(result.completion_secs, Some(90));

    let calls = gateway.calls().await;
    assert!(calls
        .iter()
        .any(|c| matches!(c, GatewayCall::AnalyzeQuiz { has_previous: false })));
}

#[tokio::test]
async fn second_take_compares_against_the_first() {
    let (engine, _store, gateway) = build_engine();
    engine
        .submit_quiz("u1", QuizType::Personality, quiz_answers("isolate"), None)
        .await
        .unwrap();
    let second = engine
        .submit_quiz("u1", QuizType::Personality, quiz_answers("confront"), None)
        .await
        .unwrap();

    let comparison = second.comparison.unwrap();
    // stress_management moved 3.0 → 9.0
    let change = comparison
        .changes
        .iter()
        .find(|c| c.trait_name == "stress_management")
        .unwrap();
    assert_eq!(change.previous, 3.0);
    assert_eq!(change.current, 9.0);
    assert_eq!(change.significance, Significance::SignificantImprovement);
    assert_eq!(comparison.overall_trend, OverallTrend::Positive);

    let calls = gateway.calls().await;
    assert!(calls
        .iter()
        .any(|c| matches!(c, GatewayCall::AnalyzeQuiz { has_previous: true })));
}

#[tokio::test]
async fn quiz_updates_profile_style_and_personality() {
    let (engine, store, _gateway) = build_engine();
    engine
        .submit_quiz("u1", QuizType::Personality, quiz_answers("confront"), None)
        .await
        .unwrap();
    let profile = store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.conversation_style, ConversationStyle::Analytical);
    assert_eq!(
        profile.personality.get("stress_response"),
        Some(&json!("confront"))
    );
}

#[tokio::test]
async fn quiz_follow_ups_are_capped() {
    let (engine, _store, gateway) = build_engine();
    gateway
        .script_quiz_analysis(QuizAnalysis {
            traits: Vec::new(),
            strengths: Vec::new(),
            growth_areas: Vec::new(),
            insights: Vec::new(),
            recommendations: (0..9).map(|i| format!("follow up {i}")).collect(),
        })
        .await;
    let result = engine
        .submit_quiz("u1", QuizType::Mood, quiz_answers("exercise"), None)
        .await
        .unwrap();
    assert_eq!(result.follow_ups.len(), crate::quiz::FOLLOW_UP_CAP);
    assert_eq!(result.follow_ups[4], "follow up 8");
}

#[tokio::test]
async fn empty_quiz_answers_are_rejected() {
    let (engine, _store, _gateway) = build_engine();
    let err = engine
        .submit_quiz("u1", QuizType::Mood, BTreeMap::new(), None)
        .await
        .unwrap_err();
    assert_eq!(kind_of(&err), Some(EngineErrorKind::Validation));
}

#[tokio::test]
async fn trait_progress_returns_the_raw_series_oldest_first() {
    let (engine, _store, _gateway) = build_engine();
    engine
        .submit_quiz("u1", QuizType::Personality, quiz_answers("isolate"), None)
        .await
        .unwrap();
    engine
        .submit_quiz("u1", QuizType::Personality, quiz_answers("confront"), None)
        .await
        .unwrap();

    let series = engine
        .trait_progress("u1", QuizType::Personality, "stress_management")
        .await
        .unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].1, 3.0);
    assert_eq!(series[1].1, 9.0);
    assert!(series[0].0 <= series[1].0);

    let empty = engine
        .trait_progress("u1", QuizType::Personality, "unknown_trait")
        .await
        .unwrap();
    assert!(empty.is_empty());
}

// -- goals ------------------------------------------------------------------

fn new_goal(title: &str, milestones: &[&str]) -> NewGoal {
    NewGoal {
        title: title.to_string(),
        description: None,
        category: "wellness".to_string(),
        priority: Priority::Medium,
        target_date: None,
        milestones: milestones.iter().map(|m| m.to_string()).collect(),
    }
}

#[tokio::test]
async fn goal_progress_at_100_auto_completes_and_counts_on_profile() {
    let (engine, store, _gateway) = build_engine();
    engine
        .submit_quiz("u1", QuizType::Personality, quiz_answers("exercise"), None)
        .await
        .unwrap();
    let goal = engine.create_goal("u1", new_goal("Meditate daily", &[])).await.unwrap();
    let goal = engine
        .update_goal_progress("u1", &goal.id, 100.0, Some("done"))
        .await
        .unwrap();
    assert_eq!(goal.status, GoalStatus::Completed);
    assert!(goal.completed_at.is_some());

    let profile = store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.stats.goals_completed, 1);
}

#[tokio::test]
async fn milestone_completion_recomputes_goal_progress() {
    let (engine, _store, _gateway) = build_engine();
    let goal = engine
        .create_goal("u1", new_goal("Read two books", &["Book one", "Book two"]))
        .await
        .unwrap();
    let first = goal.milestones[0].id.clone();
    let goal = engine.complete_milestone("u1", &goal.id, &first).await.unwrap();
    assert_eq!(goal.progress, 50.0);
    assert_eq!(goal.status, GoalStatus::Active);

    let second = goal.milestones[1].id.clone();
    let goal = engine.complete_milestone("u1", &goal.id, &second).await.unwrap();
    assert_eq!(goal.progress, 100.0);
    assert_eq!(goal.status, GoalStatus::Completed);
}

#[tokio::test]
async fn illegal_status_transition_is_a_validation_error() {
    let (engine, store, _gateway) = build_engine();
    let goal = engine.create_goal("u1", new_goal("Pause me", &[])).await.unwrap();
    engine
        .set_goal_status("u1", &goal.id, GoalStatus::Paused)
        .await
        .unwrap();
    let err = engine
        .set_goal_status("u1", &goal.id, GoalStatus::Completed)
        .await
        .unwrap_err();
    assert_eq!(kind_of(&err), Some(EngineErrorKind::Validation));

    // nothing changed
    let stored = store.get_goal(&goal.id).await.unwrap().unwrap();
    assert_eq!(stored.status, GoalStatus::Paused);
}

#[tokio::test]
async fn goal_insight_ledgers_stay_capped_on_refresh() {
    let (engine, _store, gateway) = build_engine();
    gateway
        .script_goal_analysis(GoalAnalysis {
            insights: (0..14).map(|i| format!("insight {i}")).collect(),
            recommendations: (0..20)
                .map(|i| GoalAdvice {
                    text: format!("advice {i}"),
                    kind: "action".to_string(),
                    priority: Priority::Medium,
                })
                .collect(),
            next_steps: Vec::new(),
            motivation: String::new(),
        })
        .await;
    let goal = engine.create_goal("u1", new_goal("Big goal", &[])).await.unwrap();
    let goal = engine
        .refresh_goal_insights("u1", &goal.id, None)
        .await
        .unwrap();
    assert_eq!(goal.insights.len(), 10);
    assert_eq!(goal.recommendations.len(), 15);
    assert_eq!(goal.insights[9].text, "insight 13");
}

#[tokio::test]
async fn goal_refresh_falls_back_when_gateway_fails() {
    let (engine, _store, gateway) = build_engine();
    let goal = engine.create_goal("u1", new_goal("Resilient", &[])).await.unwrap();
    gateway.set_failing(true);
    let goal = engine
        .refresh_goal_insights("u1", &goal.id, None)
        .await
        .unwrap();
    assert!(!goal.insights.is_empty());
    assert!(!goal.recommendations.is_empty());
}

#[tokio::test]
async fn goal_access_is_owner_scoped() {
    let (engine, _store, _gateway) = build_engine();
    let goal = engine.create_goal("u1", new_goal("Mine", &[])).await.unwrap();
    let err = engine
        .update_goal_progress("intruder", &goal.id, 50.0, None)
        .await
        .unwrap_err();
    assert_eq!(kind_of(&err), Some(EngineErrorKind::NotFound));
}

// -- analytics views --------------------------------------------------------

async fn seed_week(engine: &Engine, user_id: &str) {
    // oldest → newest, improving mood
    for (offset, (m, e, s)) in [(6, (4, 4, 7)), (4, (5, 5, 6)), (2, (7, 6, 4)), (0, (8, 7, 3))] {
        engine
            .record_daily_metrics(user_id, days_ago(offset), metrics(m, e, s))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn dashboard_averages_and_goal_counts() {
    let (engine, _store, _gateway) = build_engine();
    seed_week(&engine, "u1").await;
    let goal = engine.create_goal("u1", new_goal("Done soon", &[])).await.unwrap();
    engine
        .update_goal_progress("u1", &goal.id, 100.0, None)
        .await
        .unwrap();
    engine.create_goal("u1", new_goal("Still going", &[])).await.unwrap();

    let view = engine.dashboard("u1", 7).await.unwrap();
    assert_eq!(view.total_days, 4);
    assert_eq!(view.avg_mood, 6.0);
    assert_eq!(view.avg_stress, 5.0);
    assert_eq!(view.active_goals, 1);
    assert_eq!(view.goals_completed_in_period, 1);
}

#[tokio::test]
async fn dashboard_with_no_data_is_zeroed() {
    let (engine, _store, _gateway) = build_engine();
    let view = engine.dashboard("nobody", 30).await.unwrap();
    assert_eq!(view.total_days, 0);
    assert_eq!(view.avg_mood, 0.0);
}

#[tokio::test]
async fn mood_history_includes_windowed_trends() {
    let (engine, _store, _gateway) = build_engine();
    // previous window flat at 4, recent window flat at 8
    for offset in (7..14).rev() {
        engine
            .record_daily_metrics("u1", days_ago(offset), metrics(4, 4, 4))
            .await
            .unwrap();
    }
    for offset in (0..7).rev() {
        engine
            .record_daily_metrics("u1", days_ago(offset), metrics(8, 8, 8))
            .await
            .unwrap();
    }
    let view = engine.mood_history("u1", 14).await.unwrap();
    assert_eq!(view.records.len(), 14);
    assert_eq!(view.trends.mood, 100.0);
}

#[tokio::test]
async fn patterns_classifies_best_and_challenging_days() {
    let (engine, _store, _gateway) = build_engine();
    seed_week(&engine, "u1").await;
    let view = engine.patterns("u1", 7).await.unwrap();
    assert!(!view.weekday_averages.is_empty());
    // (8,7,3) scores (8+7+8)/3 ≈ 7.67 → best; (4,4,7) scores 4.0 → challenging
    assert!(!view.day_buckets.best.is_empty());
    assert!(!view.day_buckets.challenging.is_empty());
}

#[tokio::test]
async fn progress_view_groups_metrics() {
    let (engine, _store, _gateway) = build_engine();
    for offset in (7..14).rev() {
        engine
            .record_daily_metrics("u1", days_ago(offset), metrics(4, 4, 8))
            .await
            .unwrap();
    }
    for offset in (0..7).rev() {
        engine
            .record_daily_metrics("u1", days_ago(offset), metrics(8, 8, 3))
            .await
            .unwrap();
    }
    let view = engine.progress("u1", 14).await.unwrap();
    assert!(view.metrics.wellbeing_delta > 0.0);
    assert!(view.metrics.stress_management > 0.0);
    assert!(view.improving.contains(&"wellbeing".to_string()));
    assert!(view.needs_attention.is_empty());
}

#[tokio::test]
async fn ranked_insights_orders_by_priority_then_confidence() {
    let (engine, store, _gateway) = build_engine();
    let day = days_ago(1);
    let mut record = DailyRecord::new("u1", day, &metrics(6, 6, 5));
    let now = Utc::now();
    let insight = |message: &str, priority: Priority, confidence: f64| Insight {
        kind: "pattern".to_string(),
        message: message.to_string(),
        confidence,
        priority,
        category: "mood".to_string(),
        created_at: now,
    };
    record.insights = vec![
        insight("low", Priority::Low, 0.9),
        insight("high faint", Priority::High, 0.3),
        insight("high strong", Priority::High, 0.8),
        insight("medium", Priority::Medium, 0.9),
    ];
    store.insert_daily_record(&record).await.unwrap();

    let view = engine.ranked_insights("u1", 7, None, None).await.unwrap();
    assert_eq!(view.total_insights, 4);
    let order: Vec<&str> = view
        .insights
        .iter()
        .map(|e| e.insight.message.as_str())
        .collect();
    assert_eq!(order, vec!["high strong", "high faint", "medium", "low"]);
}

#[tokio::test]
async fn ranked_insights_filters_by_category_and_truncates() {
    let (engine, store, _gateway) = build_engine();
    let day = days_ago(1);
    let mut record = DailyRecord::new("u1", day, &metrics(6, 6, 5));
    let now = Utc::now();
    record.insights = (0..15)
        .map(|i| Insight {
            kind: "pattern".to_string(),
            message: format!("insight {i}"),
            confidence: 0.5,
            priority: Priority::Medium,
            category: if i % 2 == 0 { "mood" } else { "sleep" }.to_string(),
            created_at: now,
        })
        .collect();
    store.insert_daily_record(&record).await.unwrap();

    let all = engine.ranked_insights("u1", 7, None, None).await.unwrap();
    assert_eq!(all.total_insights, 15);
    assert_eq!(all.insights.len(), 10);

    let trimmed = engine.ranked_insights("u1", 7, None, Some(3)).await.unwrap();
    assert_eq!(trimmed.insights.len(), 3);
    assert_eq!(trimmed.total_insights, 15);

    let mood_only = engine
        .ranked_insights("u1", 7, Some("mood"), None)
        .await
        .unwrap();
    assert_eq!(mood_only.total_insights, 8);
    assert!(mood_only
        .insights
        .iter()
        .all(|e| e.insight.category == "mood"));
}

// -- activity counters ------------------------------------------------------

#[tokio::test]
async fn chat_and_quizzes_bump_todays_activity_counters() {
    let (engine, store, _gateway) = build_engine();
    let today = days_ago(0);
    engine
        .record_daily_metrics("u1", today, metrics(6, 6, 5))
        .await
        .unwrap();

    let (thread, _) = engine.start_thread("u1", "Chat", None).await.unwrap();
    engine.send_message("u1", &thread.id, "hello").await.unwrap();
    engine
        .submit_quiz("u1", QuizType::Mood, quiz_answers("exercise"), None)
        .await
        .unwrap();

    let record = store.get_daily_record("u1", today).await.unwrap().unwrap();
    assert_eq!(record.activities.conversations, 1);
    assert_eq!(record.activities.messages, 2);
    assert_eq!(record.activities.quizzes_completed, 1);
}
