//! Core domain types shared across the engine: daily records, conversation
//! threads and messages, goals, quiz results, and the user profile.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::scores;

/// Priority of AI-generated content. Ordering is significant: `Low` ranks
/// below `Medium` ranks below `High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Daily records
// ---------------------------------------------------------------------------

/// Raw self-reported metrics for one day. Mood, energy, and stress are on a
/// 1-10 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub mood: u8,
    pub energy: u8,
    pub stress: u8,
    #[serde(default)]
    pub productivity: Option<u8>,
    #[serde(default)]
    pub sleep_quality: Option<u8>,
    #[serde(default)]
    pub note: Option<String>,
}

impl DailyMetrics {
    /// Check that every provided metric is on the 1-10 scale.
    pub fn validate(&self) -> Result<(), EngineError> {
        let in_scale = |v: u8| (1..=10).contains(&v);
        if !in_scale(self.mood) || !in_scale(self.energy) || !in_scale(self.stress) {
            return Err(EngineError::validation(
                "mood, energy, and stress must be between 1 and 10",
            ));
        }
        for opt in [self.productivity, self.sleep_quality] {
            if let Some(v) = opt {
                if !in_scale(v) {
                    return Err(EngineError::validation(
                        "productivity and sleep_quality must be between 1 and 10",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Per-day activity counters, bumped by other engine operations.
/// `session_minutes` is written by the session-tracking caller, not by the
/// engine itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityCounters {
    #[serde(default)]
    pub conversations: u32,
    #[serde(default)]
    pub messages: u32,
    #[serde(default)]
    pub session_minutes: u32,
    #[serde(default)]
    pub goals_worked_on: u32,
    #[serde(default)]
    pub goals_completed: u32,
    #[serde(default)]
    pub quizzes_completed: u32,
}

/// One AI-generated insight attached to a daily record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub confidence: f64,
    pub priority: Priority,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// One AI-generated recommendation attached to a daily record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub urgency: Priority,
    #[serde(default)]
    pub implemented: bool,
    #[serde(default)]
    pub implemented_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The single analytics record for one (user, day) pair. The derived
/// `wellbeing` score is always recomputed from mood/energy/stress, never
/// accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    pub user_id: String,
    pub day: NaiveDate,
    pub mood: u8,
    pub energy: u8,
    pub stress: u8,
    pub productivity: u8,
    #[serde(default)]
    pub sleep_quality: Option<u8>,
    #[serde(default)]
    pub activities: ActivityCounters,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    pub wellbeing: u8,
    #[serde(default)]
    pub user_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyRecord {
    pub fn new(user_id: &str, day: NaiveDate, metrics: &DailyMetrics) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            day,
            mood: metrics.mood,
            energy: metrics.energy,
            stress: metrics.stress,
            productivity: metrics.productivity.unwrap_or(5),
            sleep_quality: metrics.sleep_quality,
            activities: ActivityCounters::default(),
            insights: Vec::new(),
            recommendations: Vec::new(),
            wellbeing: scores::wellbeing(metrics.mood, metrics.energy, metrics.stress),
            user_note: metrics.note.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the raw metrics and recompute the derived wellbeing score.
    pub fn apply_metrics(&mut self, metrics: &DailyMetrics) {
        self.mood = metrics.mood;
        self.energy = metrics.energy;
        self.stress = metrics.stress;
        if let Some(p) = metrics.productivity {
            self.productivity = p;
        }
        if metrics.sleep_quality.is_some() {
            self.sleep_quality = metrics.sleep_quality;
        }
        if metrics.note.is_some() {
            self.user_note = metrics.note.clone();
        }
        self.wellbeing = scores::wellbeing(self.mood, self.energy, self.stress);
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Ai,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageKind::User),
            "ai" => Some(MessageKind::Ai),
            _ => None,
        }
    }
}

/// Sentiment score in [-1, 1] plus a coarse label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionScore {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicScore {
    pub name: String,
    pub relevance: f64,
}

/// One message inside a conversation thread. Sentiment, emotions, and topics
/// arrive later, written by the background analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub kind: MessageKind,
    pub content: String,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub emotions: Vec<EmotionScore>,
    #[serde(default)]
    pub topics: Vec<TopicScore>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub tokens_in: Option<u32>,
    #[serde(default)]
    pub tokens_out: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(thread_id: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.to_string(),
            kind: MessageKind::User,
            content: content.to_string(),
            sentiment: None,
            emotions: Vec::new(),
            topics: Vec::new(),
            deleted: false,
            model: None,
            latency_ms: None,
            tokens_in: None,
            tokens_out: None,
            created_at: Utc::now(),
        }
    }

    pub fn ai(thread_id: &str, content: &str) -> Self {
        Self {
            kind: MessageKind::Ai,
            ..Self::user(thread_id, content)
        }
    }
}

/// A conversation thread. `message_count` only ever grows; message deletion
/// is a soft flag on the message itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message_count: i64,
    #[serde(default)]
    pub needs_follow_up: bool,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationThread {
    pub fn new(user_id: &str, title: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            last_message_at: None,
            message_count: 0,
            needs_follow_up: false,
            risk_flags: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
    Paused,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Paused => "paused",
            GoalStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(GoalStatus::Active),
            "completed" => Some(GoalStatus::Completed),
            "paused" => Some(GoalStatus::Paused),
            "cancelled" => Some(GoalStatus::Cancelled),
            _ => None,
        }
    }

    /// Allowed transitions: active→completed, active↔paused, any→cancelled.
    pub fn can_transition_to(&self, next: GoalStatus) -> bool {
        match (self, next) {
            (_, GoalStatus::Cancelled) => true,
            (GoalStatus::Active, GoalStatus::Completed) => true,
            (GoalStatus::Active, GoalStatus::Paused) => true,
            (GoalStatus::Paused, GoalStatus::Active) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl Milestone {
    pub fn new(title: &str, due_date: Option<NaiveDate>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: None,
            completed: false,
            completed_at: None,
            due_date,
        }
    }
}

/// An entry in a goal's progress history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNote {
    pub at: DateTime<Utc>,
    pub progress: f64,
    #[serde(default)]
    pub note: Option<String>,
    pub updated_by: String,
}

/// AI-generated insight on a goal, kept in a bounded ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalInsight {
    pub text: String,
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

/// AI-generated recommendation on a goal, kept in a bounded ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRecommendation {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: Priority,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub implemented: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub status: GoalStatus,
    pub priority: Priority,
    /// Percent complete, clamped to [0, 100].
    pub progress: f64,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub insights: Vec<GoalInsight>,
    #[serde(default)]
    pub recommendations: Vec<GoalRecommendation>,
    #[serde(default)]
    pub progress_history: Vec<ProgressNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Set progress (clamped to [0, 100]), append a history entry, and
    /// auto-complete when progress reaches 100.
    pub fn update_progress(&mut self, progress: f64, note: Option<&str>, updated_by: &str) {
        let now = Utc::now();
        self.progress = progress.clamp(0.0, 100.0);
        self.progress_history.push(ProgressNote {
            at: now,
            progress: self.progress,
            note: note.map(|n| n.to_string()),
            updated_by: updated_by.to_string(),
        });
        if self.progress >= 100.0 && self.status != GoalStatus::Completed {
            self.status = GoalStatus::Completed;
            self.completed_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Mark a milestone completed and recompute progress as the completed
    /// fraction of all milestones.
    pub fn complete_milestone(&mut self, milestone_id: &str) -> Result<(), EngineError> {
        let now = Utc::now();
        let milestone = self
            .milestones
            .iter_mut()
            .find(|m| m.id == milestone_id)
            .ok_or_else(|| EngineError::not_found(format!("milestone {milestone_id}")))?;
        milestone.completed = true;
        milestone.completed_at = Some(now);

        let total = self.milestones.len();
        let completed = self.milestones.iter().filter(|m| m.completed).count();
        let progress = completed as f64 / total as f64 * 100.0;
        self.update_progress(progress, Some("milestone completed"), "system");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    Personality,
    Mood,
    InitialAssessment,
    WeeklyCheckIn,
}

impl QuizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizType::Personality => "personality",
            QuizType::Mood => "mood",
            QuizType::InitialAssessment => "initial_assessment",
            QuizType::WeeklyCheckIn => "weekly_check_in",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "personality" => Some(QuizType::Personality),
            "mood" => Some(QuizType::Mood),
            "initial_assessment" => Some(QuizType::InitialAssessment),
            "weekly_check_in" => Some(QuizType::WeeklyCheckIn),
            _ => None,
        }
    }
}

/// How much a trait moved between two quiz takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    SignificantImprovement,
    SlightImprovement,
    NoChange,
    SlightDecline,
    SignificantDecline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallTrend {
    Positive,
    Stable,
    Concerning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitChange {
    #[serde(rename = "trait")]
    pub trait_name: String,
    pub previous: f64,
    pub current: f64,
    pub change: f64,
    pub significance: Significance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizComparison {
    pub previous_result_id: String,
    pub changes: Vec<TraitChange>,
    pub overall_trend: OverallTrend,
}

/// A trait score produced by the AI analysis, on a 0-10 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitScore {
    pub name: String,
    pub score: f64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRecommendation {
    pub category: String,
    pub text: String,
    pub priority: Priority,
}

/// A completed quiz: the raw answers, the deterministic rule-table scores,
/// the AI analysis, and (when a prior same-type result exists) the
/// longitudinal comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: String,
    pub user_id: String,
    pub quiz_type: QuizType,
    pub answers: BTreeMap<String, serde_json::Value>,
    /// Trait name → score from the versioned rule table.
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub traits: Vec<TraitScore>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<QuizRecommendation>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub growth_areas: Vec<String>,
    #[serde(default)]
    pub follow_ups: Vec<String>,
    #[serde(default)]
    pub comparison: Option<QuizComparison>,
    #[serde(default)]
    pub completion_secs: Option<u32>,
    pub rules_version: String,
    pub created_at: DateTime<Utc>,
}

impl QuizResult {
    pub fn new(
        user_id: &str,
        quiz_type: QuizType,
        answers: BTreeMap<String, serde_json::Value>,
        scores: BTreeMap<String, f64>,
        rules_version: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            quiz_type,
            answers,
            scores,
            traits: Vec::new(),
            insights: Vec::new(),
            recommendations: Vec::new(),
            strengths: Vec::new(),
            growth_areas: Vec::new(),
            follow_ups: Vec::new(),
            comparison: None,
            completion_secs: None,
            rules_version: rules_version.to_string(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

/// Tone the AI should take in conversation, derived from quiz answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStyle {
    Supportive,
    Analytical,
    Motivational,
    #[default]
    Gentle,
}

impl ConversationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStyle::Supportive => "supportive",
            ConversationStyle::Analytical => "analytical",
            ConversationStyle::Motivational => "motivational",
            ConversationStyle::Gentle => "gentle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "supportive" => Some(ConversationStyle::Supportive),
            "analytical" => Some(ConversationStyle::Analytical),
            "motivational" => Some(ConversationStyle::Motivational),
            "gentle" => Some(ConversationStyle::Gentle),
            _ => None,
        }
    }
}

/// Engagement counters feeding the growth score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub total_messages: u32,
    #[serde(default)]
    pub goals_completed: u32,
    #[serde(default)]
    pub growth_score: u8,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

/// Per-user personalization state: conversation style, stored quiz answers,
/// and engagement stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub conversation_style: ConversationStyle,
    /// Latest quiz answers keyed by question id, used for the personality
    /// summary in conversation context.
    #[serde(default)]
    pub personality: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub stats: UserStats,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: None,
            conversation_style: ConversationStyle::default(),
            personality: BTreeMap::new(),
            stats: UserStats::default(),
            updated_at: Utc::now(),
        }
    }
}
