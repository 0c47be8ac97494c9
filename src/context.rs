//! Personalization context assembly for gateway calls.
//!
//! Builds the role-tagged prompt window from a thread's history plus the
//! user's conversation style and personality summary. The window never
//! reorders messages and never splits an exchange by anything other than
//! the message boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ConversationStyle, Message, MessageKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the prompt window sent to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationStyle {
    /// Fixed instruction block for each style. Same style always yields the
    /// same text.
    pub fn instruction(&self) -> &'static str {
        match self {
            ConversationStyle::Supportive => {
                "Be warm and encouraging. Validate feelings before offering perspective. \
                 Remind the user of their support network when it is relevant."
            }
            ConversationStyle::Analytical => {
                "Be clear and structured. Help the user break situations into parts, \
                 weigh trade-offs, and reason toward their own conclusions."
            }
            ConversationStyle::Motivational => {
                "Be energetic and forward-looking. Highlight progress already made and \
                 frame challenges as the next step, not a setback."
            }
            ConversationStyle::Gentle => {
                "Be calm and unhurried. Ask soft, open questions and never push. Give \
                 the user room to arrive at things in their own time."
            }
        }
    }
}

/// Assemble the system prompt from the user's style and optional name.
pub fn system_prompt(style: ConversationStyle, user_name: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are a thoughtful personal-growth companion. You help the user reflect on \
         their emotional wellbeing, habits, and goals.\n\n",
    );
    if let Some(name) = user_name {
        prompt.push_str(&format!("The user's name is {name}.\n"));
    }
    prompt.push_str(style.instruction());
    prompt.push_str(
        "\n\nKeep replies concise and conversational. Never diagnose. If the user \
         appears to be in crisis, gently encourage them to seek professional help.",
    );
    prompt
}

/// One-line summary of the stored personality answers, or `None` when there
/// is nothing to summarize.
pub fn personality_summary(personality: &BTreeMap<String, Value>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(comfort) = personality.get("comfort_alone").and_then(|v| v.as_f64()) {
        parts.push(format!("comfort being alone {comfort}/5"));
    }
    if let Some(response) = personality.get("stress_response").and_then(|v| v.as_str()) {
        parts.push(format!("typical stress response: {response}"));
    }
    if let Some(concerns) = personality.get("main_concerns") {
        let listed = match concerns {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Value::String(s) => s.clone(),
            _ => String::new(),
        };
        if !listed.is_empty() {
            parts.push(format!("main concerns: {listed}"));
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// Build the prompt window: an optional leading system entry with the
/// personality summary, then the last `window` non-deleted messages in
/// chronological order with roles mapped (user → user, ai → assistant).
pub fn build_window(
    messages: &[Message],
    personality_summary: Option<&str>,
    window: usize,
) -> Vec<PromptMessage> {
    let visible: Vec<&Message> = messages.iter().filter(|m| !m.deleted).collect();
    let start = visible.len().saturating_sub(window);

    let mut prompt = Vec::with_capacity(visible.len() - start + 1);
    if let Some(summary) = personality_summary.filter(|s| !s.is_empty()) {
        prompt.push(PromptMessage {
            role: Role::System,
            content: format!("What you know about the user: {summary}"),
        });
    }
    for message in &visible[start..] {
        prompt.push(PromptMessage {
            role: match message.kind {
                MessageKind::User => Role::User,
                MessageKind::Ai => Role::Assistant,
            },
            content: message.content.clone(),
        });
    }
    prompt
}
