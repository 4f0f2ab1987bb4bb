use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Hard ceiling for command timeouts (5 minutes).
pub const MAX_COMMAND_TIMEOUT_MS: u64 = 300_000;
/// Floor for the retained output tail of a shell stream.
pub const MIN_RETAINED_TAIL_BYTES: usize = 2_000;
/// Idle shell sessions are evicted after this long (30 minutes).
pub const SESSION_TTL_MS: u64 = 30 * 60 * 1_000;
/// Minimum interval between session TTL sweeps.
pub const SWEEP_INTERVAL_MS: u64 = 30_000;
/// Persistent prompt memory is capped at this many items.
pub const MAX_MEMORY_ITEMS: usize = 120;

/// Top-level config (shrimp.toml + SHRIMP_* env overrides + named env vars).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShrimpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Embedded SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Persistent system-prompt memory file.
    #[serde(default = "default_memory_path")]
    pub memory_path: String,
    /// Shell pool capacity.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Default non-interactive command timeout.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Tool output cap in characters.
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Model allow-list. Empty means "only the default model".
    #[serde(default)]
    pub allowed_models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
}

impl Default for ShrimpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            db_path: default_db_path(),
            memory_path: default_memory_path(),
            max_sessions: default_max_sessions(),
            command_timeout_ms: default_command_timeout_ms(),
            max_output_chars: default_max_output_chars(),
            openai: OpenAiConfig {
                api_key: String::new(),
                base_url: None,
                model: default_model(),
                allowed_models: Vec::new(),
            },
            telegram: TelegramConfig::default(),
        }
    }
}

impl ShrimpConfig {
    /// Load config from a TOML file with SHRIMP_* env overrides, then apply
    /// the named env vars from the runtime contract (OPENAI_API_KEY,
    /// OPENAI_BASE_URL, OPENAI_MODEL, OPENAI_ALLOWED_MODELS,
    /// TELEGRAM_BOT_TOKEN, SHRIMP_DB_PATH, SHRIMP_MAX_SESSIONS,
    /// SHRIMP_COMMAND_TIMEOUT_MS, SHRIMP_MAX_OUTPUT_CHARS).
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or("shrimp.toml");

        let mut config: ShrimpConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SHRIMP_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.openai.api_key = key;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.openai.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.openai.model = model;
        }
        if let Ok(models) = std::env::var("OPENAI_ALLOWED_MODELS") {
            config.openai.allowed_models = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = Some(token);
        }

        Ok(config)
    }

    /// True if `model` may be used for a turn.
    pub fn model_allowed(&self, model: &str) -> bool {
        model == self.openai.model || self.openai.allowed_models.iter().any(|m| m == model)
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8790
}
fn default_db_path() -> String {
    "data/shrimp.db".to_string()
}
fn default_memory_path() -> String {
    "data/system-prompt-memory.json".to_string()
}
fn default_max_sessions() -> usize {
    8
}
fn default_command_timeout_ms() -> u64 {
    30_000
}
fn default_max_output_chars() -> usize {
    20_000
}
fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}
