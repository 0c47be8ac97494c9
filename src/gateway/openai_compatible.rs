//! Production gateway over an OpenAI-compatible chat-completions endpoint.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::config::GatewayConfig;
use crate::context::PromptMessage;
use crate::gateway::{
    AiGateway, DailyGuidance, GatewayError, GoalAnalysis, QuizAnalysis, ReplyOutcome,
    SentimentAnalysis,
};
use crate::types::{Priority, Sentiment};

pub struct OpenAiCompatibleGateway {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl Drop for OpenAiCompatibleGateway {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

/// HTTPS is required for remote URLs so the API key is never sent in
/// cleartext; plain HTTP is allowed only for localhost model servers.
fn validate_base_url(base_url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|e| format!("invalid base_url '{base_url}': {e}"))?;
    let host = parsed.host_str().unwrap_or("");
    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            let is_localhost =
                host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1";
            if is_localhost {
                warn!(base_url, "using unencrypted HTTP for local model server");
                Ok(())
            } else {
                Err(format!(
                    "HTTP is not allowed for remote URLs (base_url: '{base_url}'); \
                     use HTTPS to protect the API key in transit"
                ))
            }
        }
        scheme => Err(format!(
            "unsupported URL scheme '{scheme}' in base_url '{base_url}'"
        )),
    }
}

/// Pull the first top-level JSON object out of a model response, tolerating
/// prose or code fences around it.
fn extract_json_object(text: &str) -> Result<Value, GatewayError> {
    let start = text
        .find('{')
        .ok_or_else(|| GatewayError::bad_response("no JSON object in response"))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| GatewayError::bad_response("unterminated JSON object in response"))?;
    if end < start {
        return Err(GatewayError::bad_response("malformed JSON object in response"));
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|e| GatewayError::bad_response(format!("unparseable JSON in response: {e}")))
}

struct ChatOutcome {
    content: String,
    latency_ms: u64,
    tokens_in: u32,
    tokens_out: u32,
}

impl OpenAiCompatibleGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, String> {
        validate_base_url(&config.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    async fn chat(&self, messages: Vec<Value>) -> anyhow::Result<ChatOutcome> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, url = %url, "calling AI gateway");
        let started = Instant::now();

        let resp = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "gateway request failed");
                return Err(GatewayError::network(&e).into());
            }
        };

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            warn!(status = %status, "gateway returned an error");
            return Err(GatewayError::from_status(status.as_u16(), &text).into());
        }

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::bad_response(format!("invalid response body: {e}")))?;
        let content = data["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| GatewayError::bad_response("no content in first choice"))?
            .to_string();

        let tokens = |key: &str| {
            data.get("usage")
                .and_then(|u| u.get(key))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32
        };
        Ok(ChatOutcome {
            content,
            latency_ms: started.elapsed().as_millis() as u64,
            tokens_in: tokens("prompt_tokens"),
            tokens_out: tokens("completion_tokens"),
        })
    }

    /// Run a single-turn JSON-mode prompt and parse the object out of the
    /// reply.
    async fn json_prompt(&self, system: &str, user: &str) -> anyhow::Result<Value> {
        let outcome = self
            .chat(vec![
                json!({"role": "system", "content": system}),
                json!({"role": "user", "content": user}),
            ])
            .await?;
        Ok(extract_json_object(&outcome.content)?)
    }
}

#[async_trait]
impl AiGateway for OpenAiCompatibleGateway {
    async fn generate_reply(
        &self,
        history: &[PromptMessage],
        system_prompt: &str,
    ) -> anyhow::Result<ReplyOutcome> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(json!({"role": "system", "content": system_prompt}));
        for entry in history {
            messages.push(json!({"role": entry.role.as_str(), "content": entry.content}));
        }
        let outcome = self.chat(messages).await?;
        Ok(ReplyOutcome {
            text: outcome.content,
            model: self.model.clone(),
            latency_ms: outcome.latency_ms,
            tokens_in: outcome.tokens_in,
            tokens_out: outcome.tokens_out,
        })
    }

    async fn analyze_sentiment(&self, text: &str) -> anyhow::Result<SentimentAnalysis> {
        let system = "You analyze the emotional content of a single message from a \
                      personal-growth app. Respond with only a JSON object: \
                      {\"score\": number in [-1,1], \"label\": \"negative|neutral|positive\", \
                      \"emotions\": [{\"name\": string, \"confidence\": number in [0,1]}], \
                      \"topics\": [{\"name\": string, \"relevance\": number in [0,1]}], \
                      \"urgency\": \"low|medium|high\", \"needs_follow_up\": boolean}. \
                      Use high urgency only for signs of crisis or acute distress.";
        let parsed = self.json_prompt(system, text).await?;

        let score = parsed["score"].as_f64().unwrap_or(0.0).clamp(-1.0, 1.0);
        let label = parsed["label"].as_str().unwrap_or("neutral").to_string();
        let urgency = parsed["urgency"]
            .as_str()
            .and_then(Priority::parse)
            .unwrap_or(Priority::Low);

        let emotions = serde_json::from_value(parsed["emotions"].clone()).unwrap_or_default();
        let topics = serde_json::from_value(parsed["topics"].clone()).unwrap_or_default();

        Ok(SentimentAnalysis {
            sentiment: Sentiment { score, label },
            emotions,
            topics,
            urgency,
            needs_follow_up: parsed["needs_follow_up"].as_bool().unwrap_or(false),
        })
    }

    async fn analyze_goal(
        &self,
        goal_snapshot: &str,
        recent_context: &str,
    ) -> anyhow::Result<GoalAnalysis> {
        let system = "You coach a user on a personal goal. Respond with only a JSON \
                      object: {\"insights\": [string], \"recommendations\": \
                      [{\"text\": string, \"type\": \"action|habit|mindset\", \
                      \"priority\": \"low|medium|high\"}], \"next_steps\": [string], \
                      \"motivation\": string}. Be specific to the goal, not generic.";
        let user = format!("Goal:\n{goal_snapshot}\n\nRecent conversation:\n{recent_context}");
        let parsed = self.json_prompt(system, &user).await?;
        let analysis: GoalAnalysis = serde_json::from_value(parsed)
            .map_err(|e| GatewayError::bad_response(format!("goal analysis shape: {e}")))?;
        Ok(analysis)
    }

    async fn analyze_quiz(
        &self,
        answers: &BTreeMap<String, Value>,
        previous_scores: Option<&BTreeMap<String, f64>>,
    ) -> anyhow::Result<QuizAnalysis> {
        let system = "You interpret a self-assessment quiz from a personal-growth app. \
                      Respond with only a JSON object: {\"traits\": [{\"name\": string, \
                      \"score\": number in [0,10], \"description\": string}], \
                      \"strengths\": [string], \"growth_areas\": [string], \
                      \"insights\": [string], \"recommendations\": [string]}.";
        let mut user = format!(
            "Answers:\n{}",
            serde_json::to_string_pretty(answers).unwrap_or_default()
        );
        if let Some(previous) = previous_scores {
            user.push_str(&format!(
                "\n\nTrait scores from the previous take:\n{}",
                serde_json::to_string_pretty(previous).unwrap_or_default()
            ));
        }
        let parsed = self.json_prompt(system, &user).await?;
        let analysis: QuizAnalysis = serde_json::from_value(parsed)
            .map_err(|e| GatewayError::bad_response(format!("quiz analysis shape: {e}")))?;
        Ok(analysis)
    }

    async fn analyze_daily(&self, summary: &str) -> anyhow::Result<DailyGuidance> {
        let system = "You generate brief daily reflections from a user's self-reported \
                      metrics. Respond with only a JSON object: {\"insights\": [string, \
                      at most 3], \"recommendations\": [string, at most 2], \
                      \"motivation\": string}. Keep each entry to one sentence.";
        let parsed = self.json_prompt(system, summary).await?;
        let guidance: DailyGuidance = serde_json::from_value(parsed)
            .map_err(|e| GatewayError::bad_response(format!("daily guidance shape: {e}")))?;
        Ok(guidance)
    }
}
