//! Persistence collaborator traits.
//!
//! The engine depends on these focused traits; `Store` is the facade bound
//! used at injection points. Implementations: [`crate::state::SqliteStore`]
//! in production, `MemoryStore` in tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{
    ConversationThread, DailyRecord, EmotionScore, Goal, Message, QuizResult, QuizType, Sentiment,
    TopicScore, UserProfile,
};

/// One row per (user, day) analytics record.
#[async_trait]
pub trait DailyRecordStore: Send + Sync {
    /// Insert a new record. A record already existing for the same
    /// (user, day) fails with [`crate::EngineError`] of kind `DuplicateKey`.
    async fn insert_daily_record(&self, record: &DailyRecord) -> anyhow::Result<()>;

    /// Replace an existing record. Fails with `NotFound` if absent.
    async fn update_daily_record(&self, record: &DailyRecord) -> anyhow::Result<()>;

    async fn get_daily_record(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> anyhow::Result<Option<DailyRecord>>;

    /// Records for `[start, end]` inclusive, oldest first.
    async fn get_daily_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<DailyRecord>>;
}

/// Conversation threads and their messages.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn create_thread(&self, thread: &ConversationThread) -> anyhow::Result<()>;

    async fn get_thread(&self, thread_id: &str) -> anyhow::Result<Option<ConversationThread>>;

    /// Replace thread metadata (counters, follow-up flags). Fails with
    /// `NotFound` if absent.
    async fn update_thread(&self, thread: &ConversationThread) -> anyhow::Result<()>;

    async fn append_message(&self, message: &Message) -> anyhow::Result<()>;

    /// The newest `limit` messages of a thread, oldest first.
    async fn get_messages(&self, thread_id: &str, limit: usize) -> anyhow::Result<Vec<Message>>;

    /// Attach the background analysis results to a stored message.
    async fn apply_message_analysis(
        &self,
        message_id: &str,
        sentiment: &Sentiment,
        emotions: &[EmotionScore],
        topics: &[TopicScore],
    ) -> anyhow::Result<()>;
}

/// Goal persistence.
#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn create_goal(&self, goal: &Goal) -> anyhow::Result<()>;

    async fn get_goal(&self, goal_id: &str) -> anyhow::Result<Option<Goal>>;

    /// Full replacement. Fails with `NotFound` if absent.
    async fn update_goal(&self, goal: &Goal) -> anyhow::Result<()>;

    /// All goals for a user, newest first.
    async fn get_goals(&self, user_id: &str) -> anyhow::Result<Vec<Goal>>;
}

/// Quiz result persistence and trait history.
#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn insert_quiz_result(&self, result: &QuizResult) -> anyhow::Result<()>;

    /// The most recent result of the given type for a user.
    async fn latest_quiz_by_type(
        &self,
        user_id: &str,
        quiz_type: QuizType,
    ) -> anyhow::Result<Option<QuizResult>>;

    /// Raw (taken_at, score) series for one trait across all results of a
    /// type, oldest first. Results without the trait are skipped.
    async fn trait_series(
        &self,
        user_id: &str,
        quiz_type: QuizType,
        trait_name: &str,
    ) -> anyhow::Result<Vec<(DateTime<Utc>, f64)>>;
}

/// User profile persistence.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>>;

    async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<()>;
}

/// Facade over the focused store traits, for `Arc<dyn Store>` injection.
pub trait Store:
    Send + Sync + DailyRecordStore + ThreadStore + GoalStore + QuizStore + ProfileStore
{
}

impl<T> Store for T where
    T: Send + Sync + DailyRecordStore + ThreadStore + GoalStore + QuizStore + ProfileStore
{
}
