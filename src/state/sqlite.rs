//! SQLite-backed store.
//!
//! Scalars live in columns; nested ledgers (insights, recommendations,
//! milestones, history) are JSON text columns. The one-record-per-day
//! invariant is a composite primary key on (user_id, day), so a losing
//! concurrent insert surfaces as a unique violation which is mapped to
//! `EngineError::DuplicateKey`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::EngineError;
use crate::store::{DailyRecordStore, GoalStore, ProfileStore, QuizStore, ThreadStore};
use crate::types::{
    ActivityCounters, ConversationStyle, ConversationThread, DailyRecord, EmotionScore, Goal,
    GoalStatus, Message, MessageKind, Priority, QuizResult, QuizType, Sentiment, TopicScore,
    UserProfile, UserStats,
};

pub struct SqliteStore {
    pool: SqlitePool,
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
    Ok(serde_json::from_str(text)?)
}

fn parse_utc(text: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}

impl SqliteStore {
    pub async fn new(db_path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.create_tables().await?;
        info!(db_path, "sqlite store ready");
        Ok(store)
    }

    async fn create_tables(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS daily_records (
                user_id TEXT NOT NULL,
                day TEXT NOT NULL,
                mood INTEGER NOT NULL,
                energy INTEGER NOT NULL,
                stress INTEGER NOT NULL,
                productivity INTEGER NOT NULL,
                sleep_quality INTEGER,
                user_note TEXT,
                activities_json TEXT NOT NULL,
                insights_json TEXT NOT NULL,
                recommendations_json TEXT NOT NULL,
                wellbeing INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, day)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                last_message_at TEXT,
                message_count INTEGER NOT NULL DEFAULT 0,
                needs_follow_up INTEGER NOT NULL DEFAULT 0,
                risk_flags_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                sentiment_json TEXT,
                emotions_json TEXT NOT NULL,
                topics_json TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                model TEXT,
                latency_ms INTEGER,
                tokens_in INTEGER,
                tokens_out INTEGER,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_thread
             ON messages(thread_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                category TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                progress REAL NOT NULL,
                target_date TEXT,
                completed_at TEXT,
                milestones_json TEXT NOT NULL,
                insights_json TEXT NOT NULL,
                recommendations_json TEXT NOT NULL,
                history_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS quiz_results (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                quiz_type TEXT NOT NULL,
                answers_json TEXT NOT NULL,
                scores_json TEXT NOT NULL,
                traits_json TEXT NOT NULL,
                insights_json TEXT NOT NULL,
                recommendations_json TEXT NOT NULL,
                strengths_json TEXT NOT NULL,
                growth_areas_json TEXT NOT NULL,
                follow_ups_json TEXT NOT NULL,
                comparison_json TEXT,
                completion_secs INTEGER,
                rules_version TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_quiz_results_user
             ON quiz_results(user_id, quiz_type, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                name TEXT,
                conversation_style TEXT NOT NULL,
                personality_json TEXT NOT NULL,
                stats_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn daily_record_from_row(row: &SqliteRow) -> anyhow::Result<DailyRecord> {
    let day: String = row.try_get("day")?;
    let activities: String = row.try_get("activities_json")?;
    let insights: String = row.try_get("insights_json")?;
    let recommendations: String = row.try_get("recommendations_json")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(DailyRecord {
        user_id: row.try_get("user_id")?,
        day: day.parse::<NaiveDate>()?,
        mood: row.try_get::<i64, _>("mood")? as u8,
        energy: row.try_get::<i64, _>("energy")? as u8,
        stress: row.try_get::<i64, _>("stress")? as u8,
        productivity: row.try_get::<i64, _>("productivity")? as u8,
        sleep_quality: row
            .try_get::<Option<i64>, _>("sleep_quality")?
            .map(|v| v as u8),
        activities: from_json::<ActivityCounters>(&activities)?,
        insights: from_json(&insights)?,
        recommendations: from_json(&recommendations)?,
        wellbeing: row.try_get::<i64, _>("wellbeing")? as u8,
        user_note: row.try_get("user_note")?,
        created_at: parse_utc(&created_at)?,
        updated_at: parse_utc(&updated_at)?,
    })
}

fn thread_from_row(row: &SqliteRow) -> anyhow::Result<ConversationThread> {
    let last_message_at: Option<String> = row.try_get("last_message_at")?;
    let risk_flags: String = row.try_get("risk_flags_json")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(ConversationThread {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        last_message_at: last_message_at.as_deref().map(parse_utc).transpose()?,
        message_count: row.try_get("message_count")?,
        needs_follow_up: row.try_get::<i64, _>("needs_follow_up")? != 0,
        risk_flags: from_json(&risk_flags)?,
        created_at: parse_utc(&created_at)?,
    })
}

fn message_from_row(row: &SqliteRow) -> anyhow::Result<Message> {
    let kind: String = row.try_get("kind")?;
    let sentiment: Option<String> = row.try_get("sentiment_json")?;
    let emotions: String = row.try_get("emotions_json")?;
    let topics: String = row.try_get("topics_json")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(Message {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        kind: MessageKind::parse(&kind)
            .ok_or_else(|| anyhow::anyhow!("unknown message kind '{kind}'"))?,
        content: row.try_get("content")?,
        sentiment: sentiment
            .as_deref()
            .map(from_json::<Sentiment>)
            .transpose()?,
        emotions: from_json(&emotions)?,
        topics: from_json(&topics)?,
        deleted: row.try_get::<i64, _>("deleted")? != 0,
        model: row.try_get("model")?,
        latency_ms: row
            .try_get::<Option<i64>, _>("latency_ms")?
            .map(|v| v as u64),
        tokens_in: row
            .try_get::<Option<i64>, _>("tokens_in")?
            .map(|v| v as u32),
        tokens_out: row
            .try_get::<Option<i64>, _>("tokens_out")?
            .map(|v| v as u32),
        created_at: parse_utc(&created_at)?,
    })
}

fn goal_from_row(row: &SqliteRow) -> anyhow::Result<Goal> {
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    let target_date: Option<String> = row.try_get("target_date")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;
    let milestones: String = row.try_get("milestones_json")?;
    let insights: String = row.try_get("insights_json")?;
    let recommendations: String = row.try_get("recommendations_json")?;
    let history: String = row.try_get("history_json")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Goal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        status: GoalStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown goal status '{status}'"))?,
        priority: Priority::parse(&priority)
            .ok_or_else(|| anyhow::anyhow!("unknown priority '{priority}'"))?,
        progress: row.try_get("progress")?,
        target_date: target_date
            .map(|d| d.parse::<NaiveDate>())
            .transpose()?,
        completed_at: completed_at.as_deref().map(parse_utc).transpose()?,
        milestones: from_json(&milestones)?,
        insights: from_json(&insights)?,
        recommendations: from_json(&recommendations)?,
        progress_history: from_json(&history)?,
        created_at: parse_utc(&created_at)?,
        updated_at: parse_utc(&updated_at)?,
    })
}

fn quiz_result_from_row(row: &SqliteRow) -> anyhow::Result<QuizResult> {
    let quiz_type: String = row.try_get("quiz_type")?;
    let answers: String = row.try_get("answers_json")?;
    let scores: String = row.try_get("scores_json")?;
    let traits: String = row.try_get("traits_json")?;
    let insights: String = row.try_get("insights_json")?;
    let recommendations: String = row.try_get("recommendations_json")?;
    let strengths: String = row.try_get("strengths_json")?;
    let growth_areas: String = row.try_get("growth_areas_json")?;
    let follow_ups: String = row.try_get("follow_ups_json")?;
    let comparison: Option<String> = row.try_get("comparison_json")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(QuizResult {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        quiz_type: QuizType::parse(&quiz_type)
            .ok_or_else(|| anyhow::anyhow!("unknown quiz type '{quiz_type}'"))?,
        answers: from_json(&answers)?,
        scores: from_json(&scores)?,
        traits: from_json(&traits)?,
        insights: from_json(&insights)?,
        recommendations: from_json(&recommendations)?,
        strengths: from_json(&strengths)?,
        growth_areas: from_json(&growth_areas)?,
        follow_ups: from_json(&follow_ups)?,
        comparison: comparison.as_deref().map(from_json).transpose()?,
        completion_secs: row
            .try_get::<Option<i64>, _>("completion_secs")?
            .map(|v| v as u32),
        rules_version: row.try_get("rules_version")?,
        created_at: parse_utc(&created_at)?,
    })
}

fn profile_from_row(row: &SqliteRow) -> anyhow::Result<UserProfile> {
    let style: String = row.try_get("conversation_style")?;
    let personality: String = row.try_get("personality_json")?;
    let stats: String = row.try_get("stats_json")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(UserProfile {
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        conversation_style: ConversationStyle::parse(&style)
            .ok_or_else(|| anyhow::anyhow!("unknown conversation style '{style}'"))?,
        personality: from_json(&personality)?,
        stats: from_json::<UserStats>(&stats)?,
        updated_at: parse_utc(&updated_at)?,
    })
}

#[async_trait]
impl DailyRecordStore for SqliteStore {
    async fn insert_daily_record(&self, record: &DailyRecord) -> anyhow::Result<()> {
        let result = sqlx::query(
            "INSERT INTO daily_records
             (user_id, day, mood, energy, stress, productivity, sleep_quality, user_note,
              activities_json, insights_json, recommendations_json, wellbeing,
              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.user_id)
        .bind(record.day.to_string())
        .bind(i64::from(record.mood))
        .bind(i64::from(record.energy))
        .bind(i64::from(record.stress))
        .bind(i64::from(record.productivity))
        .bind(record.sleep_quality.map(i64::from))
        .bind(&record.user_note)
        .bind(to_json(&record.activities)?)
        .bind(to_json(&record.insights)?)
        .bind(to_json(&record.recommendations)?)
        .bind(i64::from(record.wellbeing))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(EngineError::duplicate_key(format!(
                "daily record for {} on {} already exists",
                record.user_id, record.day
            ))
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_daily_record(&self, record: &DailyRecord) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE daily_records SET
                mood = ?, energy = ?, stress = ?, productivity = ?, sleep_quality = ?,
                user_note = ?, activities_json = ?, insights_json = ?,
                recommendations_json = ?, wellbeing = ?, updated_at = ?
             WHERE user_id = ? AND day = ?",
        )
        .bind(i64::from(record.mood))
        .bind(i64::from(record.energy))
        .bind(i64::from(record.stress))
        .bind(i64::from(record.productivity))
        .bind(record.sleep_quality.map(i64::from))
        .bind(&record.user_note)
        .bind(to_json(&record.activities)?)
        .bind(to_json(&record.insights)?)
        .bind(to_json(&record.recommendations)?)
        .bind(i64::from(record.wellbeing))
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.user_id)
        .bind(record.day.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(format!(
                "no daily record for {} on {}",
                record.user_id, record.day
            ))
            .into());
        }
        Ok(())
    }

    async fn get_daily_record(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> anyhow::Result<Option<DailyRecord>> {
        let row = sqlx::query("SELECT * FROM daily_records WHERE user_id = ? AND day = ?")
            .bind(user_id)
            .bind(day.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(daily_record_from_row).transpose()
    }

    async fn get_daily_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<DailyRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM daily_records
             WHERE user_id = ? AND day >= ? AND day <= ?
             ORDER BY day ASC",
        )
        .bind(user_id)
        .bind(start.to_string())
        .bind(end.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(daily_record_from_row).collect()
    }
}

#[async_trait]
impl ThreadStore for SqliteStore {
    async fn create_thread(&self, thread: &ConversationThread) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO threads
             (id, user_id, title, last_message_at, message_count, needs_follow_up,
              risk_flags_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&thread.id)
        .bind(&thread.user_id)
        .bind(&thread.title)
        .bind(thread.last_message_at.map(|t| t.to_rfc3339()))
        .bind(thread.message_count)
        .bind(i64::from(thread.needs_follow_up))
        .bind(to_json(&thread.risk_flags)?)
        .bind(thread.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> anyhow::Result<Option<ConversationThread>> {
        let row = sqlx::query("SELECT * FROM threads WHERE id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(thread_from_row).transpose()
    }

    async fn update_thread(&self, thread: &ConversationThread) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE threads SET
                title = ?, last_message_at = ?, message_count = ?,
                needs_follow_up = ?, risk_flags_json = ?
             WHERE id = ?",
        )
        .bind(&thread.title)
        .bind(thread.last_message_at.map(|t| t.to_rfc3339()))
        .bind(thread.message_count)
        .bind(i64::from(thread.needs_follow_up))
        .bind(to_json(&thread.risk_flags)?)
        .bind(&thread.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(format!("thread {}", thread.id)).into());
        }
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO messages
             (id, thread_id, kind, content, sentiment_json, emotions_json, topics_json,
              deleted, model, latency_ms, tokens_in, tokens_out, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.thread_id)
        .bind(message.kind.as_str())
        .bind(&message.content)
        .bind(
            message
                .sentiment
                .as_ref()
                .map(to_json)
                .transpose()?,
        )
        .bind(to_json(&message.emotions)?)
        .bind(to_json(&message.topics)?)
        .bind(i64::from(message.deleted))
        .bind(&message.model)
        .bind(message.latency_ms.map(|v| v as i64))
        .bind(message.tokens_in.map(i64::from))
        .bind(message.tokens_out.map(i64::from))
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_messages(&self, thread_id: &str, limit: usize) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE thread_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(thread_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        let mut messages: Vec<Message> = rows
            .iter()
            .map(message_from_row)
            .collect::<anyhow::Result<_>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn apply_message_analysis(
        &self,
        message_id: &str,
        sentiment: &Sentiment,
        emotions: &[EmotionScore],
        topics: &[TopicScore],
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE messages SET sentiment_json = ?, emotions_json = ?, topics_json = ?
             WHERE id = ?",
        )
        .bind(to_json(sentiment)?)
        .bind(to_json(&emotions)?)
        .bind(to_json(&topics)?)
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(format!("message {message_id}")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl GoalStore for SqliteStore {
    async fn create_goal(&self, goal: &Goal) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO goals
             (id, user_id, title, description, category, status, priority, progress,
              target_date, completed_at, milestones_json, insights_json,
              recommendations_json, history_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&goal.id)
        .bind(&goal.user_id)
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(&goal.category)
        .bind(goal.status.as_str())
        .bind(goal.priority.as_str())
        .bind(goal.progress)
        .bind(goal.target_date.map(|d| d.to_string()))
        .bind(goal.completed_at.map(|t| t.to_rfc3339()))
        .bind(to_json(&goal.milestones)?)
        .bind(to_json(&goal.insights)?)
        .bind(to_json(&goal.recommendations)?)
        .bind(to_json(&goal.progress_history)?)
        .bind(goal.created_at.to_rfc3339())
        .bind(goal.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_goal(&self, goal_id: &str) -> anyhow::Result<Option<Goal>> {
        let row = sqlx::query("SELECT * FROM goals WHERE id = ?")
            .bind(goal_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(goal_from_row).transpose()
    }

    async fn update_goal(&self, goal: &Goal) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE goals SET
                title = ?, description = ?, category = ?, status = ?, priority = ?,
                progress = ?, target_date = ?, completed_at = ?, milestones_json = ?,
                insights_json = ?, recommendations_json = ?, history_json = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(&goal.category)
        .bind(goal.status.as_str())
        .bind(goal.priority.as_str())
        .bind(goal.progress)
        .bind(goal.target_date.map(|d| d.to_string()))
        .bind(goal.completed_at.map(|t| t.to_rfc3339()))
        .bind(to_json(&goal.milestones)?)
        .bind(to_json(&goal.insights)?)
        .bind(to_json(&goal.recommendations)?)
        .bind(to_json(&goal.progress_history)?)
        .bind(goal.updated_at.to_rfc3339())
        .bind(&goal.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(format!("goal {}", goal.id)).into());
        }
        Ok(())
    }

    async fn get_goals(&self, user_id: &str) -> anyhow::Result<Vec<Goal>> {
        let rows = sqlx::query(
            "SELECT * FROM goals WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(goal_from_row).collect()
    }
}

#[async_trait]
impl QuizStore for SqliteStore {
    async fn insert_quiz_result(&self, result: &QuizResult) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO quiz_results
             (id, user_id, quiz_type, answers_json, scores_json, traits_json,
              insights_json, recommendations_json, strengths_json, growth_areas_json,
              follow_ups_json, comparison_json, completion_secs, rules_version,
              created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&result.id)
        .bind(&result.user_id)
        .bind(result.quiz_type.as_str())
        .bind(to_json(&result.answers)?)
        .bind(to_json(&result.scores)?)
        .bind(to_json(&result.traits)?)
        .bind(to_json(&result.insights)?)
        .bind(to_json(&result.recommendations)?)
        .bind(to_json(&result.strengths)?)
        .bind(to_json(&result.growth_areas)?)
        .bind(to_json(&result.follow_ups)?)
        .bind(result.comparison.as_ref().map(to_json).transpose()?)
        .bind(result.completion_secs.map(i64::from))
        .bind(&result.rules_version)
        .bind(result.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_quiz_by_type(
        &self,
        user_id: &str,
        quiz_type: QuizType,
    ) -> anyhow::Result<Option<QuizResult>> {
        let row = sqlx::query(
            "SELECT * FROM quiz_results WHERE user_id = ? AND quiz_type = ?
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(quiz_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(quiz_result_from_row).transpose()
    }

    async fn trait_series(
        &self,
        user_id: &str,
        quiz_type: QuizType,
        trait_name: &str,
    ) -> anyhow::Result<Vec<(DateTime<Utc>, f64)>> {
        let rows = sqlx::query(
            "SELECT scores_json, created_at FROM quiz_results
             WHERE user_id = ? AND quiz_type = ?
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(quiz_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut series = Vec::new();
        for row in &rows {
            let scores_text: String = row.try_get("scores_json")?;
            let scores: std::collections::BTreeMap<String, f64> = from_json(&scores_text)?;
            if let Some(score) = scores.get(trait_name) {
                let created_at: String = row.try_get("created_at")?;
                series.push((parse_utc(&created_at)?, *score));
            }
        }
        Ok(series)
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO profiles
             (user_id, name, conversation_style, personality_json, stats_json, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                conversation_style = excluded.conversation_style,
                personality_json = excluded.personality_json,
                stats_json = excluded.stats_json,
                updated_at = excluded.updated_at",
        )
        .bind(&profile.user_id)
        .bind(&profile.name)
        .bind(profile.conversation_style.as_str())
        .bind(to_json(&profile.personality)?)
        .bind(to_json(&profile.stats)?)
        .bind(profile.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
