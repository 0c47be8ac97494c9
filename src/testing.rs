//! Test doubles: a scripted [`MockGateway`] and an in-memory [`MemoryStore`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::error::EngineError;
use crate::gateway::{
    AiGateway, DailyGuidance, GoalAnalysis, QuizAnalysis, ReplyOutcome, SentimentAnalysis,
};
use crate::store::{DailyRecordStore, GoalStore, ProfileStore, QuizStore, ThreadStore};
use crate::types::{
    ConversationThread, DailyRecord, EmotionScore, Goal, Message, QuizResult, QuizType, Sentiment,
    TopicScore, UserProfile,
};

/// One recorded gateway invocation, for asserting on prompts and inputs.
#[derive(Debug, Clone)]
pub enum GatewayCall {
    GenerateReply {
        system_prompt: String,
        history_len: usize,
    },
    AnalyzeSentiment {
        text: String,
    },
    AnalyzeGoal {
        snapshot: String,
        context: String,
    },
    AnalyzeQuiz {
        has_previous: bool,
    },
    AnalyzeDaily {
        summary: String,
    },
}

/// Scripted gateway. Responses are consumed front-to-back from per-method
/// queues; an empty queue yields a fixed default. `fail_all` makes every
/// method error so fallback paths can be exercised.
#[derive(Default)]
pub struct MockGateway {
    replies: Mutex<VecDeque<ReplyOutcome>>,
    sentiments: Mutex<VecDeque<SentimentAnalysis>>,
    goal_analyses: Mutex<VecDeque<GoalAnalysis>>,
    quiz_analyses: Mutex<VecDeque<QuizAnalysis>>,
    daily_guidance: Mutex<VecDeque<DailyGuidance>>,
    fail_all: AtomicBool,
    pub calls: Mutex<Vec<GatewayCall>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.fail_all.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    pub async fn script_reply(&self, reply: ReplyOutcome) {
        self.replies.lock().await.push_back(reply);
    }

    pub async fn script_reply_text(&self, text: &str) {
        self.script_reply(ReplyOutcome {
            text: text.to_string(),
            model: "mock-model".to_string(),
            latency_ms: 12,
            tokens_in: 40,
            tokens_out: 20,
        })
        .await;
    }

    pub async fn script_sentiment(&self, analysis: SentimentAnalysis) {
        self.sentiments.lock().await.push_back(analysis);
    }

    pub async fn script_goal_analysis(&self, analysis: GoalAnalysis) {
        self.goal_analyses.lock().await.push_back(analysis);
    }

    pub async fn script_quiz_analysis(&self, analysis: QuizAnalysis) {
        self.quiz_analyses.lock().await.push_back(analysis);
    }

    pub async fn script_daily_guidance(&self, guidance: DailyGuidance) {
        self.daily_guidance.lock().await.push_back(guidance);
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().await.clone()
    }

    fn check_failing(&self) -> anyhow::Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            anyhow::bail!("mock gateway configured to fail");
        }
        Ok(())
    }
}

#[async_trait]
impl AiGateway for MockGateway {
    async fn generate_reply(
        &self,
        history: &[crate::context::PromptMessage],
        system_prompt: &str,
    ) -> anyhow::Result<ReplyOutcome> {
        self.calls.lock().await.push(GatewayCall::GenerateReply {
            system_prompt: system_prompt.to_string(),
            history_len: history.len(),
        });
        self.check_failing()?;
        Ok(self.replies.lock().await.pop_front().unwrap_or(ReplyOutcome {
            text: "Thanks for sharing that with me.".to_string(),
            model: "mock-model".to_string(),
            latency_ms: 10,
            tokens_in: 30,
            tokens_out: 15,
        }))
    }

    async fn analyze_sentiment(&self, text: &str) -> anyhow::Result<SentimentAnalysis> {
        self.calls.lock().await.push(GatewayCall::AnalyzeSentiment {
            text: text.to_string(),
        });
        self.check_failing()?;
        Ok(self
            .sentiments
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| SentimentAnalysis {
                sentiment: Sentiment {
                    score: 0.3,
                    label: "positive".to_string(),
                },
                emotions: vec![EmotionScore {
                    name: "calm".to_string(),
                    confidence: 0.7,
                }],
                topics: vec![TopicScore {
                    name: "daily life".to_string(),
                    relevance: 0.6,
                }],
                urgency: crate::types::Priority::Low,
                needs_follow_up: false,
            }))
    }

    async fn analyze_goal(
        &self,
        goal_snapshot: &str,
        recent_context: &str,
    ) -> anyhow::Result<GoalAnalysis> {
        self.calls.lock().await.push(GatewayCall::AnalyzeGoal {
            snapshot: goal_snapshot.to_string(),
            context: recent_context.to_string(),
        });
        self.check_failing()?;
        Ok(self
            .goal_analyses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(GoalAnalysis::fallback))
    }

    async fn analyze_quiz(
        &self,
        _answers: &BTreeMap<String, Value>,
        previous_scores: Option<&BTreeMap<String, f64>>,
    ) -> anyhow::Result<QuizAnalysis> {
        self.calls.lock().await.push(GatewayCall::AnalyzeQuiz {
            has_previous: previous_scores.is_some(),
        });
        self.check_failing()?;
        Ok(self
            .quiz_analyses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(QuizAnalysis::fallback))
    }

    async fn analyze_daily(&self, summary: &str) -> anyhow::Result<DailyGuidance> {
        self.calls.lock().await.push(GatewayCall::AnalyzeDaily {
            summary: summary.to_string(),
        });
        self.check_failing()?;
        Ok(self
            .daily_guidance
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(DailyGuidance::fallback))
    }
}

/// In-memory store matching the semantics of the sqlite backend: duplicate
/// (user, day) inserts fail with `DuplicateKey`, updates of absent rows with
/// `NotFound`.
#[derive(Default)]
pub struct MemoryStore {
    daily: RwLock<BTreeMap<(String, NaiveDate), DailyRecord>>,
    threads: RwLock<HashMap<String, ConversationThread>>,
    messages: RwLock<Vec<Message>>,
    goals: RwLock<HashMap<String, Goal>>,
    quizzes: RwLock<Vec<QuizResult>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DailyRecordStore for MemoryStore {
    async fn insert_daily_record(&self, record: &DailyRecord) -> anyhow::Result<()> {
        let mut daily = self.daily.write().await;
        let key = (record.user_id.clone(), record.day);
        if daily.contains_key(&key) {
            return Err(EngineError::duplicate_key(format!(
                "daily record for {} on {}",
                record.user_id, record.day
            ))
            .into());
        }
        daily.insert(key, record.clone());
        Ok(())
    }

    async fn update_daily_record(&self, record: &DailyRecord) -> anyhow::Result<()> {
        let mut daily = self.daily.write().await;
        let key = (record.user_id.clone(), record.day);
        match daily.get_mut(&key) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(EngineError::not_found(format!(
                "daily record for {} on {}",
                record.user_id, record.day
            ))
            .into()),
        }
    }

    async fn get_daily_record(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> anyhow::Result<Option<DailyRecord>> {
        let daily = self.daily.read().await;
        Ok(daily.get(&(user_id.to_string(), day)).cloned())
    }

    async fn get_daily_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<DailyRecord>> {
        let daily = self.daily.read().await;
        Ok(daily
            .range((user_id.to_string(), start)..=(user_id.to_string(), end))
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn create_thread(&self, thread: &ConversationThread) -> anyhow::Result<()> {
        self.threads
            .write()
            .await
            .insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> anyhow::Result<Option<ConversationThread>> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn update_thread(&self, thread: &ConversationThread) -> anyhow::Result<()> {
        let mut threads = self.threads.write().await;
        match threads.get_mut(&thread.id) {
            Some(existing) => {
                *existing = thread.clone();
                Ok(())
            }
            None => Err(EngineError::not_found(format!("thread {}", thread.id)).into()),
        }
    }

    async fn append_message(&self, message: &Message) -> anyhow::Result<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn get_messages(&self, thread_id: &str, limit: usize) -> anyhow::Result<Vec<Message>> {
        let messages = self.messages.read().await;
        let of_thread: Vec<Message> = messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect();
        let skip = of_thread.len().saturating_sub(limit);
        Ok(of_thread.into_iter().skip(skip).collect())
    }

    async fn apply_message_analysis(
        &self,
        message_id: &str,
        sentiment: &Sentiment,
        emotions: &[EmotionScore],
        topics: &[TopicScore],
    ) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| EngineError::not_found(format!("message {message_id}")))?;
        message.sentiment = Some(sentiment.clone());
        message.emotions = emotions.to_vec();
        message.topics = topics.to_vec();
        Ok(())
    }
}

#[async_trait]
impl GoalStore for MemoryStore {
    async fn create_goal(&self, goal: &Goal) -> anyhow::Result<()> {
        self.goals.write().await.insert(goal.id.clone(), goal.clone());
        Ok(())
    }

    async fn get_goal(&self, goal_id: &str) -> anyhow::Result<Option<Goal>> {
        Ok(self.goals.read().await.get(goal_id).cloned())
    }

    async fn update_goal(&self, goal: &Goal) -> anyhow::Result<()> {
        let mut goals = self.goals.write().await;
        match goals.get_mut(&goal.id) {
            Some(existing) => {
                *existing = goal.clone();
                Ok(())
            }
            None => Err(EngineError::not_found(format!("goal {}", goal.id)).into()),
        }
    }

    async fn get_goals(&self, user_id: &str) -> anyhow::Result<Vec<Goal>> {
        let goals = self.goals.read().await;
        let mut result: Vec<Goal> = goals
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn insert_quiz_result(&self, result: &QuizResult) -> anyhow::Result<()> {
        self.quizzes.write().await.push(result.clone());
        Ok(())
    }

    async fn latest_quiz_by_type(
        &self,
        user_id: &str,
        quiz_type: QuizType,
    ) -> anyhow::Result<Option<QuizResult>> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes
            .iter()
            .rev()
            .find(|q| q.user_id == user_id && q.quiz_type == quiz_type)
            .cloned())
    }

    async fn trait_series(
        &self,
        user_id: &str,
        quiz_type: QuizType,
        trait_name: &str,
    ) -> anyhow::Result<Vec<(DateTime<Utc>, f64)>> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes
            .iter()
            .filter(|q| q.user_id == user_id && q.quiz_type == quiz_type)
            .filter_map(|q| q.scores.get(trait_name).map(|score| (q.created_at, *score)))
            .collect())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }
}
