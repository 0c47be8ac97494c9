//! AI Gateway collaborator.
//!
//! The engine consumes text generation and analysis through the [`AiGateway`]
//! trait and never depends on a concrete model provider. Every method has a
//! deterministic fallback payload defined here; the engine applies it when a
//! call fails, so gateway unavailability degrades output quality but never
//! fails an operation.

mod error;
mod openai_compatible;

pub use error::{GatewayError, GatewayErrorKind};
pub use openai_compatible::OpenAiCompatibleGateway;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::PromptMessage;
use crate::types::{EmotionScore, Priority, Sentiment, TopicScore, TraitScore};

/// Fixed reply used when the gateway cannot produce one.
pub const FALLBACK_REPLY: &str =
    "I'm having trouble connecting right now, but I'm still here with you. \
     Tell me more about what's on your mind and we'll pick this up together.";

const FALLBACK_MOTIVATION: &str =
    "Showing up for yourself today is already progress. Keep going.";

/// A generated chat reply with its call metadata.
#[derive(Debug, Clone)]
pub struct ReplyOutcome {
    pub text: String,
    pub model: String,
    pub latency_ms: u64,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

impl ReplyOutcome {
    /// Deterministic reply used when generation fails.
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_REPLY.to_string(),
            model: "fallback".to_string(),
            latency_ms: 0,
            tokens_in: 0,
            tokens_out: 0,
        }
    }
}

/// Sentiment analysis of a single user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub sentiment: Sentiment,
    pub emotions: Vec<EmotionScore>,
    pub topics: Vec<TopicScore>,
    pub urgency: Priority,
    pub needs_follow_up: bool,
}

impl SentimentAnalysis {
    /// Neutral result applied when analysis fails. Never raises urgency.
    pub fn neutral_fallback() -> Self {
        Self {
            sentiment: Sentiment {
                score: 0.0,
                label: "neutral".to_string(),
            },
            emotions: Vec::new(),
            topics: Vec::new(),
            urgency: Priority::Low,
            needs_follow_up: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAdvice {
    pub text: String,
    #[serde(rename = "type", default = "default_advice_kind")]
    pub kind: String,
    #[serde(default)]
    pub priority: Priority,
}

fn default_advice_kind() -> String {
    "action".to_string()
}

/// Analysis of a goal's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAnalysis {
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<GoalAdvice>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub motivation: String,
}

impl GoalAnalysis {
    pub fn fallback() -> Self {
        Self {
            insights: vec![
                "Consistent small steps move goals forward more reliably than bursts of \
                 effort."
                    .to_string(),
            ],
            recommendations: vec![GoalAdvice {
                text: "Pick one concrete action for this goal you can finish today."
                    .to_string(),
                kind: "action".to_string(),
                priority: Priority::Medium,
            }],
            next_steps: vec!["Review this goal again at the end of the week.".to_string()],
            motivation: FALLBACK_MOTIVATION.to_string(),
        }
    }
}

/// AI analysis of a completed quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAnalysis {
    #[serde(default)]
    pub traits: Vec<TraitScore>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub growth_areas: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl QuizAnalysis {
    pub fn fallback() -> Self {
        Self {
            traits: Vec::new(),
            strengths: vec!["Taking time for self-reflection".to_string()],
            growth_areas: Vec::new(),
            insights: vec![
                "Completing this check-in is itself a signal that you're engaged with \
                 your own growth."
                    .to_string(),
            ],
            recommendations: vec![
                "Revisit this quiz in a few weeks to see how your answers shift."
                    .to_string(),
            ],
        }
    }
}

/// Daily guidance generated from one day's metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyGuidance {
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub motivation: String,
}

impl DailyGuidance {
    pub fn fallback() -> Self {
        Self {
            insights: vec![
                "Checking in with yourself daily builds the self-awareness everything \
                 else rests on."
                    .to_string(),
            ],
            recommendations: vec![
                "Take five quiet minutes today to notice how you actually feel."
                    .to_string(),
            ],
            motivation: FALLBACK_MOTIVATION.to_string(),
        }
    }
}

/// The engine's contract with the AI service.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Generate a chat reply from the prompt window and system prompt.
    async fn generate_reply(
        &self,
        history: &[PromptMessage],
        system_prompt: &str,
    ) -> anyhow::Result<ReplyOutcome>;

    /// Analyze the sentiment, emotions, topics, and urgency of one message.
    async fn analyze_sentiment(&self, text: &str) -> anyhow::Result<SentimentAnalysis>;

    /// Analyze a goal given a snapshot of its state and recent conversation
    /// context.
    async fn analyze_goal(
        &self,
        goal_snapshot: &str,
        recent_context: &str,
    ) -> anyhow::Result<GoalAnalysis>;

    /// Analyze quiz answers, optionally against the previous trait scores.
    async fn analyze_quiz(
        &self,
        answers: &BTreeMap<String, Value>,
        previous_scores: Option<&BTreeMap<String, f64>>,
    ) -> anyhow::Result<QuizAnalysis>;

    /// Generate insights and recommendations from a one-day metrics summary.
    async fn analyze_daily(&self, summary: &str) -> anyhow::Result<DailyGuidance>;
}
