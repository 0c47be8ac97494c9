//! Quiz scoring and longitudinal comparison.
//!
//! Scoring is fully deterministic: a versioned rule table maps question ids
//! to trait contributions, so the same answers under the same table version
//! always produce the same scores. AI analysis of quiz results is layered on
//! top by the engine and never feeds back into these scores.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{
    ConversationStyle, OverallTrend, Priority, QuizComparison, QuizRecommendation, QuizResult,
    Significance, TraitChange,
};

/// Cap for the follow-up suggestions attached to a quiz result.
pub const FOLLOW_UP_CAP: usize = 5;

/// How one question's answer contributes to a trait score (0-10 scale).
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Numeric 1-5 scale answer multiplied onto the trait.
    Scale { multiplier: f64 },
    /// Categorical answer mapped through a fixed table; unknown answers use
    /// `default`.
    Lookup {
        map: &'static [(&'static str, f64)],
        default: f64,
    },
    /// Free-text answer scored by length: base + len / chars_per_point,
    /// clamped to [min, max].
    TextLength {
        chars_per_point: usize,
        base: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Clone)]
pub struct ScoringRule {
    pub question_id: &'static str,
    pub trait_name: &'static str,
    pub kind: RuleKind,
}

/// A versioned set of scoring rules. Adding coverage means adding a new
/// version, never changing an existing one.
#[derive(Debug, Clone)]
pub struct RuleTable {
    pub version: &'static str,
    rules: Vec<ScoringRule>,
}

const STRESS_RESPONSE_MAP: &[(&str, f64)] = &[
    ("confront", 9.0),
    ("seek_support", 8.0),
    ("exercise", 7.0),
    ("procrastinate", 4.0),
    ("isolate", 3.0),
];

impl RuleTable {
    pub fn v1() -> Self {
        Self {
            version: "v1",
            rules: vec![
                ScoringRule {
                    question_id: "comfort_alone",
                    trait_name: "social_comfort",
                    kind: RuleKind::Scale { multiplier: 2.0 },
                },
                ScoringRule {
                    question_id: "stress_response",
                    trait_name: "stress_management",
                    kind: RuleKind::Lookup {
                        map: STRESS_RESPONSE_MAP,
                        default: 5.0,
                    },
                },
                ScoringRule {
                    question_id: "difficult_decision",
                    trait_name: "decision_making",
                    kind: RuleKind::TextLength {
                        chars_per_point: 10,
                        base: 3.0,
                        min: 3.0,
                        max: 10.0,
                    },
                },
            ],
        }
    }

    /// Score a set of answers. Questions without a rule contribute nothing;
    /// rules whose question was not answered contribute nothing.
    pub fn score(&self, answers: &BTreeMap<String, Value>) -> BTreeMap<String, f64> {
        let mut scores = BTreeMap::new();
        for rule in &self.rules {
            let Some(answer) = answers.get(rule.question_id) else {
                continue;
            };
            let score = match &rule.kind {
                RuleKind::Scale { multiplier } => answer.as_f64().map(|v| v * multiplier),
                RuleKind::Lookup { map, default } => answer.as_str().map(|s| {
                    map.iter()
                        .find(|(key, _)| *key == s)
                        .map(|(_, v)| *v)
                        .unwrap_or(*default)
                }),
                RuleKind::TextLength {
                    chars_per_point,
                    base,
                    min,
                    max,
                } => answer.as_str().map(|s| {
                    (base + (s.chars().count() / chars_per_point) as f64).clamp(*min, *max)
                }),
            };
            if let Some(score) = score {
                scores.insert(rule.trait_name.to_string(), score);
            }
        }
        scores
    }
}

/// Classify a trait change: |change| >= 2 is significant, 1 <= |change| < 2
/// is slight, below that no change.
pub fn classify_change(change: f64) -> Significance {
    if change >= 2.0 {
        Significance::SignificantImprovement
    } else if change <= -2.0 {
        Significance::SignificantDecline
    } else if change >= 1.0 {
        Significance::SlightImprovement
    } else if change <= -1.0 {
        Significance::SlightDecline
    } else {
        Significance::NoChange
    }
}

/// Compare a fresh set of trait scores against a previous quiz result.
/// Only traits present in both takes are compared. The overall trend counts
/// raw sign of movement (not significance): more improvements than declines
/// is positive, fewer is concerning, equal is stable.
pub fn compare(current: &BTreeMap<String, f64>, previous: &QuizResult) -> QuizComparison {
    let mut changes = Vec::new();
    let mut improvements = 0usize;
    let mut declines = 0usize;
    for (trait_name, current_score) in current {
        let Some(previous_score) = previous.scores.get(trait_name) else {
            continue;
        };
        let change = current_score - previous_score;
        if change > 0.0 {
            improvements += 1;
        } else if change < 0.0 {
            declines += 1;
        }
        changes.push(TraitChange {
            trait_name: trait_name.clone(),
            previous: *previous_score,
            current: *current_score,
            change,
            significance: classify_change(change),
        });
    }
    let overall_trend = if improvements > declines {
        OverallTrend::Positive
    } else if declines > improvements {
        OverallTrend::Concerning
    } else {
        OverallTrend::Stable
    };
    QuizComparison {
        previous_result_id: previous.id.clone(),
        changes,
        overall_trend,
    }
}

/// Rule-based insight text derived straight from the answers, independent of
/// the AI analysis.
pub fn derive_insights(answers: &BTreeMap<String, Value>) -> Vec<String> {
    let mut insights = Vec::new();
    if let Some(comfort) = answers.get("comfort_alone").and_then(|v| v.as_f64()) {
        if comfort <= 2.0 {
            insights.push(
                "Time alone seems uncomfortable for you right now. Building a better \
                 relationship with yourself could be a meaningful area of growth."
                    .to_string(),
            );
        } else if comfort >= 4.0 {
            insights.push(
                "You have a solid relationship with your own company, which is a strong \
                 foundation for emotional resilience."
                    .to_string(),
            );
        }
    }
    if let Some(concerns) = answers.get("main_concerns") {
        let mentions = |topic: &str| match concerns {
            Value::Array(items) => items.iter().any(|v| v.as_str() == Some(topic)),
            Value::String(s) => s == topic,
            _ => false,
        };
        if mentions("relationships") {
            insights.push(
                "Relationships are on your mind. Exploring how you connect with others \
                 could unlock meaningful progress."
                    .to_string(),
            );
        }
        if mentions("career") {
            insights.push(
                "Career questions are weighing on you. Breaking them into concrete, \
                 smaller goals tends to make them feel more manageable."
                    .to_string(),
            );
        }
    }
    insights
}

/// Rule-based recommendations keyed off the stress-response answer.
pub fn derive_recommendations(answers: &BTreeMap<String, Value>) -> Vec<QuizRecommendation> {
    let mut recommendations = Vec::new();
    if let Some(response) = answers.get("stress_response").and_then(|v| v.as_str()) {
        let rec = match response {
            "isolate" => Some((
                "Reaching out to one trusted person when stress hits can break the \
                 isolation pattern before it deepens.",
                Priority::High,
            )),
            "procrastinate" => Some((
                "Try starting with the smallest possible piece of what you're avoiding. \
                 Momentum matters more than size.",
                Priority::High,
            )),
            "seek_support" => Some((
                "Leaning on your support network is working for you. Consider also \
                 building one solo coping practice for moments when no one is available.",
                Priority::Medium,
            )),
            "exercise" => Some((
                "Physical activity is a strong stress outlet. Keeping it consistent on \
                 low-stress days protects it as a habit.",
                Priority::Low,
            )),
            _ => None,
        };
        if let Some((text, priority)) = rec {
            recommendations.push(QuizRecommendation {
                category: "stress".to_string(),
                text: text.to_string(),
                priority,
            });
        }
    }
    recommendations
}

/// Conversation style implied by the stress-response answer.
pub fn style_from_answers(answers: &BTreeMap<String, Value>) -> ConversationStyle {
    match answers.get("stress_response").and_then(|v| v.as_str()) {
        Some("seek_support") => ConversationStyle::Supportive,
        Some("confront") => ConversationStyle::Analytical,
        _ => ConversationStyle::Gentle,
    }
}
