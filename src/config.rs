//! Engine configuration.
//!
//! Every tunable threshold lives here with its production default, so a
//! deployment can override any of them from a TOML file without code changes.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Top-level engine configuration. `EngineConfig::default()` reproduces the
/// production defaults; `load` overlays a TOML file on top of them.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub trends: TrendsConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub ledgers: LedgerConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trends: TrendsConfig::default(),
            patterns: PatternsConfig::default(),
            ledgers: LedgerConfig::default(),
            context: ContextConfig::default(),
            ranker: RankerConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file. Missing sections and keys fall
    /// back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Windowed trend comparison settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendsConfig {
    /// Number of most-recent days compared against the same number of days
    /// before them.
    #[serde(default = "default_window_days")]
    pub window_days: usize,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

fn default_window_days() -> usize {
    7
}

/// Day-classification thresholds for pattern detection.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternsConfig {
    /// Days with a composite score at or above this are "best" days.
    #[serde(default = "default_best_day_threshold")]
    pub best_day_threshold: f64,
    /// Days with a composite score at or below this are "challenging" days.
    #[serde(default = "default_challenging_day_threshold")]
    pub challenging_day_threshold: f64,
    /// How many days to report per bucket.
    #[serde(default = "default_top_days")]
    pub top_days: usize,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            best_day_threshold: default_best_day_threshold(),
            challenging_day_threshold: default_challenging_day_threshold(),
            top_days: default_top_days(),
        }
    }
}

fn default_best_day_threshold() -> f64 {
    7.0
}

fn default_challenging_day_threshold() -> f64 {
    4.0
}

fn default_top_days() -> usize {
    5
}

/// Caps for the bounded AI-content ledgers. Appends past a cap evict the
/// oldest entries.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_daily_insights")]
    pub daily_insights: usize,
    #[serde(default = "default_daily_recommendations")]
    pub daily_recommendations: usize,
    #[serde(default = "default_goal_insights")]
    pub goal_insights: usize,
    #[serde(default = "default_goal_recommendations")]
    pub goal_recommendations: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            daily_insights: default_daily_insights(),
            daily_recommendations: default_daily_recommendations(),
            goal_insights: default_goal_insights(),
            goal_recommendations: default_goal_recommendations(),
        }
    }
}

fn default_daily_insights() -> usize {
    5
}

fn default_daily_recommendations() -> usize {
    3
}

fn default_goal_insights() -> usize {
    10
}

fn default_goal_recommendations() -> usize {
    15
}

/// Conversation context assembly settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    /// How many recent messages go into the prompt window.
    #[serde(default = "default_window_messages")]
    pub window_messages: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_messages: default_window_messages(),
        }
    }
}

fn default_window_messages() -> usize {
    20
}

/// Defaults for ranked insight/recommendation queries.
#[derive(Debug, Clone, Deserialize)]
pub struct RankerConfig {
    #[serde(default = "default_top_insights")]
    pub top_insights: usize,
    #[serde(default = "default_top_recommendations")]
    pub top_recommendations: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            top_insights: default_top_insights(),
            top_recommendations: default_top_recommendations(),
        }
    }
}

fn default_top_insights() -> usize {
    10
}

fn default_top_recommendations() -> usize {
    5
}

/// Connection settings for the OpenAI-compatible gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    60
}
