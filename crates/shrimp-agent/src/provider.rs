use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tool definition advertised to the LLM API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call extracted from an assistant reply. `arguments` is the raw
/// JSON string as sent by the model — parsing is the caller's concern.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One assistant round: text and/or tool calls.
#[derive(Debug, Clone, Default)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
}

/// Request to a chat-completion endpoint.
///
/// `messages` is the full OpenAI-format array (system message first) so the
/// tool loop can interleave structured assistant/tool messages that plain
/// role+content pairs cannot express.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<serde_json::Value>,
    pub tools: Vec<ToolDefinition>,
}

/// Common interface for chat-completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// One non-streaming round-trip. `None` means the API returned no
    /// assistant message at all.
    async fn complete(&self, req: &ChatRequest) -> Result<Option<AssistantReply>, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
}
