//! The orchestrating engine.
//!
//! `Engine` owns no I/O of its own: persistence and AI calls go through the
//! injected [`Store`] and [`AiGateway`]. Gateway failures are always
//! recovered with deterministic fallbacks; store failures and domain errors
//! propagate.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context;
use crate::error::EngineError;
use crate::gateway::{
    AiGateway, DailyGuidance, GoalAnalysis, QuizAnalysis, ReplyOutcome, SentimentAnalysis,
};
use crate::ledger;
use crate::quiz::{self, RuleTable};
use crate::ranker;
use crate::scores;
use crate::store::Store;
use crate::trends::{self, DayBuckets, MetricTrends, ProgressMetrics, WeekdayAverages};
use crate::types::{
    ActivityCounters, ConversationThread, DailyMetrics, DailyRecord, Goal, GoalInsight,
    GoalRecommendation, GoalStatus, Insight, Message, Milestone, Priority, QuizResult, QuizType,
    Recommendation, UserProfile,
};

pub struct Engine {
    store: Arc<dyn Store>,
    gateway: Arc<dyn AiGateway>,
    config: EngineConfig,
}

// ---------------------------------------------------------------------------
// View types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_days: usize,
    pub avg_mood: f64,
    pub avg_energy: f64,
    pub avg_stress: f64,
    pub avg_wellbeing: f64,
    pub active_goals: usize,
    pub goals_completed_in_period: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodHistoryView {
    pub records: Vec<DailyRecord>,
    pub trends: MetricTrends,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternsView {
    pub weekday_averages: Vec<WeekdayAverages>,
    pub day_buckets: DayBuckets,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub metrics: ProgressMetrics,
    pub improving: Vec<String>,
    pub stable: Vec<String>,
    pub needs_attention: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatedInsight {
    pub day: NaiveDate,
    #[serde(flatten)]
    pub insight: Insight,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatedRecommendation {
    pub day: NaiveDate,
    #[serde(flatten)]
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedInsights {
    pub insights: Vec<DatedInsight>,
    pub recommendations: Vec<DatedRecommendation>,
    pub total_insights: usize,
    pub total_recommendations: usize,
}

/// One chat turn: the persisted user message and the persisted AI reply.
#[derive(Debug, Clone, Serialize)]
pub struct ChatExchange {
    pub user_message: Message,
    pub ai_message: Message,
}

/// Input for goal creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGoal {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    /// Milestone titles, created uncompleted.
    #[serde(default)]
    pub milestones: Vec<String>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn range_for(days: u32) -> (NaiveDate, NaiveDate) {
    let end = Utc::now().date_naive();
    let start = end - Duration::days(i64::from(days.saturating_sub(1)));
    (start, end)
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn AiGateway>, config: EngineConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    // -- daily metrics ------------------------------------------------------

    /// Upsert the (user, day) record and enrich it with daily guidance.
    /// Wellbeing is always recomputed from the submitted metrics. A losing
    /// concurrent insert surfaces as a `DuplicateKey` error.
    pub async fn record_daily_metrics(
        &self,
        user_id: &str,
        day: NaiveDate,
        metrics: DailyMetrics,
    ) -> anyhow::Result<DailyRecord> {
        metrics.validate()?;

        let existing = self.store.get_daily_record(user_id, day).await?;
        let is_new = existing.is_none();
        let mut record = match existing {
            Some(mut record) => {
                record.apply_metrics(&metrics);
                record
            }
            None => DailyRecord::new(user_id, day, &metrics),
        };

        let summary = format!(
            "Mood {}/10, energy {}/10, stress {}/10, productivity {}/10.{}",
            record.mood,
            record.energy,
            record.stress,
            record.productivity,
            record
                .user_note
                .as_deref()
                .map(|n| format!(" User note: {n}"))
                .unwrap_or_default()
        );
        let guidance = match self.gateway.analyze_daily(&summary).await {
            Ok(guidance) => guidance,
            Err(e) => {
                warn!(user_id, error = %e, "daily guidance unavailable, using fallback");
                DailyGuidance::fallback()
            }
        };

        let now = Utc::now();
        for text in guidance.insights {
            ledger::push_capped(
                &mut record.insights,
                Insight {
                    kind: "daily_reflection".to_string(),
                    message: text,
                    confidence: 0.8,
                    priority: Priority::Medium,
                    category: "wellbeing".to_string(),
                    created_at: now,
                },
                self.config.ledgers.daily_insights,
            );
        }
        for text in guidance.recommendations {
            ledger::push_capped(
                &mut record.recommendations,
                Recommendation {
                    title: "Today's suggestion".to_string(),
                    description: text,
                    kind: "action".to_string(),
                    category: "wellbeing".to_string(),
                    urgency: Priority::Medium,
                    implemented: false,
                    implemented_at: None,
                    created_at: now,
                },
                self.config.ledgers.daily_recommendations,
            );
        }
        record.updated_at = now;

        if is_new {
            self.store.insert_daily_record(&record).await?;
        } else {
            self.store.update_daily_record(&record).await?;
        }
        info!(user_id, day = %day, wellbeing = record.wellbeing, "daily metrics recorded");
        Ok(record)
    }

    // -- analytics views ----------------------------------------------------

    pub async fn dashboard(&self, user_id: &str, days: u32) -> anyhow::Result<DashboardView> {
        let (start, end) = range_for(days);
        let records = self.store.get_daily_range(user_id, start, end).await?;
        let goals = self.store.get_goals(user_id).await?;

        let avg = |f: fn(&DailyRecord) -> f64| {
            if records.is_empty() {
                0.0
            } else {
                round1(records.iter().map(f).sum::<f64>() / records.len() as f64)
            }
        };
        Ok(DashboardView {
            start,
            end,
            total_days: records.len(),
            avg_mood: avg(|r| f64::from(r.mood)),
            avg_energy: avg(|r| f64::from(r.energy)),
            avg_stress: avg(|r| f64::from(r.stress)),
            avg_wellbeing: avg(|r| f64::from(r.wellbeing)),
            active_goals: goals.iter().filter(|g| g.status == GoalStatus::Active).count(),
            goals_completed_in_period: goals
                .iter()
                .filter(|g| {
                    g.completed_at
                        .map(|t| {
                            let day = t.date_naive();
                            day >= start && day <= end
                        })
                        .unwrap_or(false)
                })
                .count(),
        })
    }

    pub async fn mood_history(&self, user_id: &str, days: u32) -> anyhow::Result<MoodHistoryView> {
        let (start, end) = range_for(days);
        let records = self.store.get_daily_range(user_id, start, end).await?;
        let trends = trends::windowed_trends(&records, self.config.trends.window_days);
        Ok(MoodHistoryView { records, trends })
    }

    pub async fn patterns(&self, user_id: &str, days: u32) -> anyhow::Result<PatternsView> {
        let (start, end) = range_for(days);
        let records = self.store.get_daily_range(user_id, start, end).await?;
        Ok(PatternsView {
            weekday_averages: trends::weekday_averages(&records),
            day_buckets: trends::classify_days(&records, &self.config.patterns),
        })
    }

    pub async fn progress(&self, user_id: &str, days: u32) -> anyhow::Result<ProgressView> {
        let (start, end) = range_for(days);
        let records = self.store.get_daily_range(user_id, start, end).await?;
        let metrics = trends::progress_metrics(&records, self.config.trends.window_days);
        let (improving, stable, needs_attention) = group_progress(&metrics);
        Ok(ProgressView {
            metrics,
            improving,
            stable,
            needs_attention,
        })
    }

    /// Merge the insight/recommendation ledgers across the window and rank
    /// them (priority first, then confidence; stable on ties). `top_k`
    /// overrides the configured insight count.
    pub async fn ranked_insights(
        &self,
        user_id: &str,
        days: u32,
        category: Option<&str>,
        top_k: Option<usize>,
    ) -> anyhow::Result<RankedInsights> {
        let (start, end) = range_for(days);
        let records = self.store.get_daily_range(user_id, start, end).await?;

        let mut insights = Vec::new();
        let mut recommendations = Vec::new();
        for record in &records {
            for insight in &record.insights {
                if category.map_or(true, |c| insight.category == c) {
                    insights.push(DatedInsight {
                        day: record.day,
                        insight: insight.clone(),
                    });
                }
            }
            for recommendation in &record.recommendations {
                if category.map_or(true, |c| recommendation.category == c) {
                    recommendations.push(DatedRecommendation {
                        day: record.day,
                        recommendation: recommendation.clone(),
                    });
                }
            }
        }

        let total_insights = insights.len();
        let total_recommendations = recommendations.len();
        let insights = ranker::rank_top_k(
            insights,
            top_k.unwrap_or(self.config.ranker.top_insights),
            |e| e.insight.priority,
            |e| e.insight.confidence,
        );
        let recommendations = ranker::rank_top_k_by_priority(
            recommendations,
            self.config.ranker.top_recommendations,
            |e| e.recommendation.urgency,
        );
        Ok(RankedInsights {
            insights,
            recommendations,
            total_insights,
            total_recommendations,
        })
    }

    // -- conversation -------------------------------------------------------

    /// Create a thread; when an initial message is given, run the first
    /// exchange through `send_message`.
    pub async fn start_thread(
        &self,
        user_id: &str,
        title: &str,
        initial_message: Option<&str>,
    ) -> anyhow::Result<(ConversationThread, Option<ChatExchange>)> {
        let thread = ConversationThread::new(user_id, title);
        self.store.create_thread(&thread).await?;
        info!(user_id, thread_id = %thread.id, "thread started");

        self.bump_today_activities(user_id, |activities| {
            activities.conversations += 1;
        })
        .await;

        let exchange = match initial_message {
            Some(content) => Some(self.send_message(user_id, &thread.id, content).await?),
            None => None,
        };
        // re-read so counters reflect the first exchange
        let thread = self
            .store
            .get_thread(&thread.id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("thread {}", thread.id)))?;
        Ok((thread, exchange))
    }

    /// One chat turn: persist the user message, generate and persist the
    /// reply, update counters, then dispatch background sentiment analysis.
    /// The analysis is dispatched strictly after the user message is stored,
    /// at most once per message.
    pub async fn send_message(
        &self,
        user_id: &str,
        thread_id: &str,
        content: &str,
    ) -> anyhow::Result<ChatExchange> {
        if content.trim().is_empty() {
            return Err(EngineError::validation("message content is empty").into());
        }
        let mut thread = self
            .store
            .get_thread(thread_id)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| EngineError::not_found(format!("thread {thread_id}")))?;

        let mut profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id));

        let user_message = Message::user(thread_id, content);
        self.store.append_message(&user_message).await?;

        let history = self
            .store
            .get_messages(thread_id, self.config.context.window_messages)
            .await?;
        let summary = context::personality_summary(&profile.personality);
        let window =
            context::build_window(&history, summary.as_deref(), self.config.context.window_messages);
        let prompt = context::system_prompt(profile.conversation_style, profile.name.as_deref());

        let reply = match self.gateway.generate_reply(&window, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(thread_id, error = %e, "reply generation failed, using fallback");
                ReplyOutcome::fallback()
            }
        };

        let mut ai_message = Message::ai(thread_id, &reply.text);
        ai_message.model = Some(reply.model);
        ai_message.latency_ms = Some(reply.latency_ms);
        ai_message.tokens_in = Some(reply.tokens_in);
        ai_message.tokens_out = Some(reply.tokens_out);
        self.store.append_message(&ai_message).await?;

        thread.message_count += 2;
        thread.last_message_at = Some(ai_message.created_at);
        self.store.update_thread(&thread).await?;

        profile.stats.total_messages += 2;
        profile.stats.last_active = Some(Utc::now());
        profile.stats.growth_score = scores::growth(
            profile.stats.total_sessions,
            profile.stats.current_streak,
            profile.stats.total_messages,
            profile.stats.goals_completed,
        );
        profile.updated_at = Utc::now();
        self.store.upsert_profile(&profile).await?;

        self.bump_today_activities(user_id, |activities| {
            activities.messages += 2;
        })
        .await;

        // dispatched only now, after both messages are durable
        self.spawn_sentiment_pass(&user_message);

        Ok(ChatExchange {
            user_message,
            ai_message,
        })
    }

    fn spawn_sentiment_pass(&self, message: &Message) {
        let store = Arc::clone(&self.store);
        let gateway = Arc::clone(&self.gateway);
        let message_id = message.id.clone();
        let thread_id = message.thread_id.clone();
        let content = message.content.clone();
        tokio::spawn(async move {
            run_sentiment_pass(store, gateway, message_id, thread_id, content).await;
        });
    }

    // -- quizzes ------------------------------------------------------------

    /// Score a quiz through the versioned rule table, layer the AI analysis
    /// on top, compare against the latest prior same-type result, persist,
    /// and update the user's conversation style.
    pub async fn submit_quiz(
        &self,
        user_id: &str,
        quiz_type: QuizType,
        answers: BTreeMap<String, Value>,
        completion_secs: Option<u32>,
    ) -> anyhow::Result<QuizResult> {
        if answers.is_empty() {
            return Err(EngineError::validation("quiz answers are empty").into());
        }

        let rules = RuleTable::v1();
        let trait_scores = rules.score(&answers);
        let previous = self.store.latest_quiz_by_type(user_id, quiz_type).await?;

        let analysis = match self
            .gateway
            .analyze_quiz(&answers, previous.as_ref().map(|p| &p.scores))
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(user_id, error = %e, "quiz analysis unavailable, using fallback");
                QuizAnalysis::fallback()
            }
        };

        let mut result =
            QuizResult::new(user_id, quiz_type, answers, trait_scores, rules.version);
        result.completion_secs = completion_secs;
        result.comparison = previous.as_ref().map(|p| quiz::compare(&result.scores, p));
        result.traits = analysis.traits;
        result.strengths = analysis.strengths;
        result.growth_areas = analysis.growth_areas;
        result.insights = quiz::derive_insights(&result.answers);
        result.insights.extend(analysis.insights);
        result.recommendations = quiz::derive_recommendations(&result.answers);
        for text in analysis.recommendations {
            ledger::push_capped(&mut result.follow_ups, text, quiz::FOLLOW_UP_CAP);
        }
        self.store.insert_quiz_result(&result).await?;

        let mut profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id));
        profile
            .personality
            .extend(result.answers.iter().map(|(k, v)| (k.clone(), v.clone())));
        profile.conversation_style = quiz::style_from_answers(&result.answers);
        profile.updated_at = Utc::now();
        self.store.upsert_profile(&profile).await?;

        self.bump_today_activities(user_id, |activities| {
            activities.quizzes_completed += 1;
        })
        .await;

        info!(user_id, quiz_type = quiz_type.as_str(), "quiz submitted");
        Ok(result)
    }

    /// Raw (taken_at, score) series for one trait. No smoothing.
    pub async fn trait_progress(
        &self,
        user_id: &str,
        quiz_type: QuizType,
        trait_name: &str,
    ) -> anyhow::Result<Vec<(DateTime<Utc>, f64)>> {
        self.store.trait_series(user_id, quiz_type, trait_name).await
    }

    // -- goals --------------------------------------------------------------

    pub async fn create_goal(&self, user_id: &str, new_goal: NewGoal) -> anyhow::Result<Goal> {
        if new_goal.title.trim().is_empty() {
            return Err(EngineError::validation("goal title is empty").into());
        }
        let now = Utc::now();
        let goal = Goal {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: new_goal.title,
            description: new_goal.description,
            category: new_goal.category,
            status: GoalStatus::Active,
            priority: new_goal.priority,
            progress: 0.0,
            target_date: new_goal.target_date,
            completed_at: None,
            milestones: new_goal
                .milestones
                .iter()
                .map(|title| Milestone::new(title, None))
                .collect(),
            insights: Vec::new(),
            recommendations: Vec::new(),
            progress_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.create_goal(&goal).await?;
        info!(user_id, goal_id = %goal.id, "goal created");
        Ok(goal)
    }

    pub async fn update_goal_progress(
        &self,
        user_id: &str,
        goal_id: &str,
        progress: f64,
        note: Option<&str>,
    ) -> anyhow::Result<Goal> {
        let mut goal = self.fetch_owned_goal(user_id, goal_id).await?;
        let was_completed = goal.status == GoalStatus::Completed;
        goal.update_progress(progress, note, user_id);
        self.store.update_goal(&goal).await?;

        if goal.status == GoalStatus::Completed && !was_completed {
            self.record_goal_completion(user_id).await;
        } else {
            self.bump_today_activities(user_id, |activities| {
                activities.goals_worked_on += 1;
            })
            .await;
        }
        Ok(goal)
    }

    pub async fn complete_milestone(
        &self,
        user_id: &str,
        goal_id: &str,
        milestone_id: &str,
    ) -> anyhow::Result<Goal> {
        let mut goal = self.fetch_owned_goal(user_id, goal_id).await?;
        let was_completed = goal.status == GoalStatus::Completed;
        goal.complete_milestone(milestone_id)?;
        self.store.update_goal(&goal).await?;

        if goal.status == GoalStatus::Completed && !was_completed {
            self.record_goal_completion(user_id).await;
        }
        Ok(goal)
    }

    /// Explicit status transition. Illegal transitions are `Validation`
    /// errors and change nothing.
    pub async fn set_goal_status(
        &self,
        user_id: &str,
        goal_id: &str,
        status: GoalStatus,
    ) -> anyhow::Result<Goal> {
        let mut goal = self.fetch_owned_goal(user_id, goal_id).await?;
        if !goal.status.can_transition_to(status) {
            return Err(EngineError::validation(format!(
                "cannot transition goal from {} to {}",
                goal.status.as_str(),
                status.as_str()
            ))
            .into());
        }
        let was_completed = goal.status == GoalStatus::Completed;
        goal.status = status;
        let now = Utc::now();
        if status == GoalStatus::Completed {
            goal.completed_at = Some(now);
        }
        goal.updated_at = now;
        self.store.update_goal(&goal).await?;

        if status == GoalStatus::Completed && !was_completed {
            self.record_goal_completion(user_id).await;
        }
        Ok(goal)
    }

    /// Refresh the goal's AI insight ledgers, optionally grounding the
    /// analysis in a thread's recent messages. Gateway failure falls back to
    /// fixed advice; the ledgers stay capped either way.
    pub async fn refresh_goal_insights(
        &self,
        user_id: &str,
        goal_id: &str,
        thread_id: Option<&str>,
    ) -> anyhow::Result<Goal> {
        let mut goal = self.fetch_owned_goal(user_id, goal_id).await?;

        let completed_milestones = goal.milestones.iter().filter(|m| m.completed).count();
        let snapshot = format!(
            "Title: {}\nCategory: {}\nStatus: {}\nProgress: {:.0}%\nMilestones: {}/{} done{}",
            goal.title,
            goal.category,
            goal.status.as_str(),
            goal.progress,
            completed_milestones,
            goal.milestones.len(),
            goal.description
                .as_deref()
                .map(|d| format!("\nDescription: {d}"))
                .unwrap_or_default()
        );
        let recent_context = match thread_id {
            Some(thread_id) => {
                let messages = self.store.get_messages(thread_id, 10).await?;
                messages
                    .iter()
                    .filter(|m| !m.deleted)
                    .map(|m| format!("{}: {}", m.kind.as_str(), m.content))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            None => String::new(),
        };

        let analysis = match self.gateway.analyze_goal(&snapshot, &recent_context).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(goal_id, error = %e, "goal analysis unavailable, using fallback");
                GoalAnalysis::fallback()
            }
        };

        let now = Utc::now();
        for text in analysis.insights {
            ledger::push_capped(
                &mut goal.insights,
                GoalInsight {
                    text,
                    confidence: 0.75,
                    generated_at: now,
                },
                self.config.ledgers.goal_insights,
            );
        }
        for advice in analysis.recommendations {
            ledger::push_capped(
                &mut goal.recommendations,
                GoalRecommendation {
                    text: advice.text,
                    kind: advice.kind,
                    priority: advice.priority,
                    generated_at: now,
                    implemented: false,
                },
                self.config.ledgers.goal_recommendations,
            );
        }
        goal.updated_at = now;
        self.store.update_goal(&goal).await?;
        Ok(goal)
    }

    pub async fn goals(&self, user_id: &str) -> anyhow::Result<Vec<Goal>> {
        self.store.get_goals(user_id).await
    }

    // -- helpers ------------------------------------------------------------

    async fn fetch_owned_goal(&self, user_id: &str, goal_id: &str) -> anyhow::Result<Goal> {
        self.store
            .get_goal(goal_id)
            .await?
            .filter(|g| g.user_id == user_id)
            .ok_or_else(|| EngineError::not_found(format!("goal {goal_id}")).into())
    }

    async fn record_goal_completion(&self, user_id: &str) {
        if let Ok(Some(mut profile)) = self.store.get_profile(user_id).await {
            profile.stats.goals_completed += 1;
            profile.stats.growth_score = scores::growth(
                profile.stats.total_sessions,
                profile.stats.current_streak,
                profile.stats.total_messages,
                profile.stats.goals_completed,
            );
            profile.updated_at = Utc::now();
            if let Err(e) = self.store.upsert_profile(&profile).await {
                warn!(user_id, error = %e, "failed to update profile after goal completion");
            }
        }
        self.bump_today_activities(user_id, |activities| {
            activities.goals_completed += 1;
        })
        .await;
    }

    /// Bump today's activity counters when today's record exists. Absence is
    /// not an error: counters only accumulate on days the user checked in.
    async fn bump_today_activities(
        &self,
        user_id: &str,
        apply: impl FnOnce(&mut ActivityCounters),
    ) {
        let today = Utc::now().date_naive();
        match self.store.get_daily_record(user_id, today).await {
            Ok(Some(mut record)) => {
                apply(&mut record.activities);
                record.updated_at = Utc::now();
                if let Err(e) = self.store.update_daily_record(&record).await {
                    warn!(user_id, error = %e, "failed to update activity counters");
                }
            }
            Ok(None) => debug!(user_id, "no daily record today, skipping activity bump"),
            Err(e) => warn!(user_id, error = %e, "failed to load daily record for activity bump"),
        }
    }
}

/// The deferred sentiment pass. Runs detached from the chat turn; analysis
/// failure degrades to the neutral fallback, and only high urgency touches
/// the thread's follow-up state.
pub(crate) async fn run_sentiment_pass(
    store: Arc<dyn Store>,
    gateway: Arc<dyn AiGateway>,
    message_id: String,
    thread_id: String,
    content: String,
) {
    let analysis = match gateway.analyze_sentiment(&content).await {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(message_id, error = %e, "sentiment analysis failed, applying neutral fallback");
            SentimentAnalysis::neutral_fallback()
        }
    };

    if let Err(e) = store
        .apply_message_analysis(
            &message_id,
            &analysis.sentiment,
            &analysis.emotions,
            &analysis.topics,
        )
        .await
    {
        warn!(message_id, error = %e, "failed to store sentiment analysis");
        return;
    }

    if analysis.urgency == Priority::High {
        match store.get_thread(&thread_id).await {
            Ok(Some(mut thread)) => {
                thread.needs_follow_up = true;
                if analysis.needs_follow_up && !thread.risk_flags.iter().any(|f| f == "urgent") {
                    thread.risk_flags.push("urgent".to_string());
                }
                if let Err(e) = store.update_thread(&thread).await {
                    warn!(thread_id, error = %e, "failed to flag thread for follow-up");
                }
            }
            Ok(None) => warn!(thread_id, "thread vanished before follow-up flagging"),
            Err(e) => warn!(thread_id, error = %e, "failed to load thread for follow-up"),
        }
    }
}

/// Group the progress composite: positive values are improving, values
/// within ±5 are stable, values below -5 need attention.
fn group_progress(metrics: &ProgressMetrics) -> (Vec<String>, Vec<String>, Vec<String>) {
    let entries = [
        ("wellbeing", metrics.wellbeing_delta),
        ("mood_stability", metrics.mood_stability),
        ("energy", metrics.energy_trend),
        ("stress_management", metrics.stress_management),
    ];
    let mut improving = Vec::new();
    let mut stable = Vec::new();
    let mut needs_attention = Vec::new();
    for (name, value) in entries {
        if value > 0.0 {
            improving.push(name.to_string());
        }
        if value.abs() <= 5.0 {
            stable.push(name.to_string());
        }
        if value < -5.0 {
            needs_attention.push(name.to_string());
        }
    }
    (improving, stable, needs_attention)
}
