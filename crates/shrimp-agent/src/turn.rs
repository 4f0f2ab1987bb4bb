//! The turn orchestrator: drives the bounded LLM↔tools loop for one user
//! message, persists the transcript, and streams bubble/tool events through
//! an optional sink.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use shrimp_store::{
    AddMessageOpts, Attachment, AttachmentKind, Message, Role, Store, StoreError, DEFAULT_TITLE,
};

use crate::bubble::split_bubbles;
use crate::event::TurnEvent;
use crate::memory::PromptMemory;
use crate::prompt::build_system_prompt;
use crate::provider::{ChatProvider, ChatRequest, ProviderError};
use crate::tools::ToolRegistry;

/// Upper bound on LLM round-trips per turn.
const MAX_ROUNDS: usize = 8;
/// Streaming pacing: token chunk size and delays.
const TOKEN_CHUNK_CHARS: usize = 20;
const TOKEN_DELAY: Duration = Duration::from_millis(14);
const BUBBLE_DELAY: Duration = Duration::from_millis(120);
/// Caps for previews embedded in events and history.
const TOOL_OUTPUT_PREVIEW_CHARS: usize = 800;
const REPLY_PREVIEW_CHARS: usize = 180;
const ATTACHMENT_EXCERPT_CHARS: usize = 5_000;
const TITLE_CHARS: usize = 60;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("{0}")]
    BadRequest(String),

    #[error("LLM error: {0}")]
    Upstream(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub conversation_id: Option<String>,
    pub message: String,
    pub model: Option<String>,
    pub reply_to_message_id: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub message_ids: Vec<String>,
    pub bubbles: Vec<String>,
}

/// Which models a turn may use.
#[derive(Debug, Clone)]
pub struct ModelPolicy {
    pub default_model: String,
    pub allowed: Vec<String>,
}

impl ModelPolicy {
    /// The requested model when it is on the allow-list, else the default.
    pub fn resolve(&self, requested: Option<&str>) -> String {
        match requested {
            Some(m) if m == self.default_model || self.allowed.iter().any(|a| a == m) => {
                m.to_string()
            }
            _ => self.default_model.clone(),
        }
    }
}

/// The turn engine. Every collaborator is injected, so tests can swap in a
/// scripted provider, a throwaway store, and a temp memory file.
pub struct TurnOrchestrator {
    store: Arc<Store>,
    provider: Arc<dyn ChatProvider>,
    tools: ToolRegistry,
    memory: Arc<PromptMemory>,
    models: ModelPolicy,
}

impl TurnOrchestrator {
    pub fn new(
        store: Arc<Store>,
        provider: Arc<dyn ChatProvider>,
        tools: ToolRegistry,
        memory: Arc<PromptMemory>,
        models: ModelPolicy,
    ) -> Self {
        Self {
            store,
            provider,
            tools,
            memory,
            models,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn models(&self) -> &ModelPolicy {
        &self.models
    }

    /// Run one user turn. Events go to `sink` (when given) in strict order;
    /// `cancel` aborts the loop between LLM rounds.
    pub async fn run_turn(
        &self,
        req: TurnRequest,
        sink: Option<mpsc::Sender<TurnEvent>>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let message = req.message.trim().to_string();
        if message.is_empty() {
            return Err(TurnError::BadRequest("message must not be empty".into()));
        }

        let model = self.models.resolve(req.model.as_deref());
        let started = Instant::now();

        let conversation = self
            .store
            .upsert_conversation(req.conversation_id.as_deref(), &model)?;
        emit(
            &sink,
            TurnEvent::Conversation {
                conversation_id: conversation.id.clone(),
            },
        )
        .await;

        self.store.add_message(
            &conversation.id,
            Role::User,
            &message,
            AddMessageOpts {
                reply_to_message_id: req.reply_to_message_id.clone(),
                attachments: req.attachments.clone(),
                ..Default::default()
            },
        )?;

        if conversation.title == DEFAULT_TITLE {
            let title = compact_preview(&message, TITLE_CHARS);
            self.store
                .set_conversation_title_if_default(&conversation.id, &title)?;
        }

        // Rebuild the full history so edits and prior turns are reflected.
        let history = self.store.list_messages(&conversation.id)?;
        let mut working: Vec<serde_json::Value> = Vec::with_capacity(history.len() + 1);
        working.push(serde_json::json!({
            "role": "system",
            "content": build_system_prompt(&self.memory.list()),
        }));
        working.extend(build_history(&history));

        let definitions = self.tools.definitions();
        let mut final_parts: Vec<String> = Vec::new();
        let mut rounds = 0usize;

        for round in 0..MAX_ROUNDS {
            if cancel.is_cancelled() {
                warn!(conversation_id = %conversation.id, round, "turn cancelled between rounds");
                break;
            }
            rounds = round + 1;

            let request = ChatRequest {
                model: model.clone(),
                messages: working.clone(),
                tools: definitions.clone(),
            };
            let reply = match self.provider.complete(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    emit(
                        &sink,
                        TurnEvent::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                    return Err(TurnError::Upstream(e));
                }
            };
            let Some(reply) = reply else { break };

            let content = reply
                .content
                .as_deref()
                .map(strip_think_tags)
                .unwrap_or_default();

            if reply.tool_calls.is_empty() {
                if !content.is_empty() {
                    final_parts.push(content);
                }
                break;
            }

            // Keep any interleaved text so it still reaches the user.
            if !content.is_empty() {
                final_parts.push(content.clone());
            }

            let assistant_tool_calls: Vec<serde_json::Value> = reply
                .tool_calls
                .iter()
                .map(|call| {
                    serde_json::json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments },
                    })
                })
                .collect();
            working.push(serde_json::json!({
                "role": "assistant",
                "content": if content.is_empty() { serde_json::Value::Null } else { content.clone().into() },
                "tool_calls": assistant_tool_calls,
            }));

            for call in &reply.tool_calls {
                let record =
                    self.store
                        .add_tool_call(&conversation.id, &call.name, &call.arguments)?;
                let args: serde_json::Value = serde_json::from_str(&call.arguments)
                    .ok()
                    .filter(serde_json::Value::is_object)
                    .unwrap_or_else(|| serde_json::json!({}));

                emit(
                    &sink,
                    TurnEvent::ToolCallStarted {
                        tool_call_id: record.id.clone(),
                        name: call.name.clone(),
                        args: args.clone(),
                    },
                )
                .await;

                let result = self.tools.run(&call.name, args).await;
                let output_json =
                    serde_json::to_string(&result.value).unwrap_or_else(|_| "{}".to_string());
                self.store
                    .complete_tool_call(&record.id, !result.is_error, &output_json)?;

                emit(
                    &sink,
                    TurnEvent::ToolCallOutput {
                        tool_call_id: record.id.clone(),
                        output: compact_chars(&output_json, TOOL_OUTPUT_PREVIEW_CHARS),
                    },
                )
                .await;
                emit(
                    &sink,
                    TurnEvent::ToolCallFinished {
                        tool_call_id: record.id,
                        ok: !result.is_error,
                        output: result.value.clone(),
                    },
                )
                .await;

                working.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": output_json,
                }));
            }
        }

        let final_text = final_parts.join("\n\n");
        let mut bubbles = split_bubbles(&final_text);
        if bubbles.is_empty() {
            bubbles.push("Done.".to_string());
        }

        let bubble_group_id = Uuid::new_v4().to_string();
        let mut message_ids = Vec::with_capacity(bubbles.len());
        for (i, bubble) in bubbles.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(BUBBLE_DELAY).await;
            }
            let persisted = self.store.add_message(
                &conversation.id,
                Role::Assistant,
                bubble,
                AddMessageOpts {
                    bubble_group_id: Some(bubble_group_id.clone()),
                    ..Default::default()
                },
            )?;
            emit(
                &sink,
                TurnEvent::AssistantBubbleStart {
                    bubble_id: persisted.id.clone(),
                },
            )
            .await;
            for chunk in chunk_chars(bubble, TOKEN_CHUNK_CHARS) {
                emit(
                    &sink,
                    TurnEvent::Token {
                        bubble_id: persisted.id.clone(),
                        value: chunk,
                    },
                )
                .await;
                tokio::time::sleep(TOKEN_DELAY).await;
            }
            message_ids.push(persisted.id);
        }

        emit(
            &sink,
            TurnEvent::AssistantDone {
                conversation_id: conversation.id.clone(),
                message_ids: message_ids.clone(),
            },
        )
        .await;

        info!(
            conversation_id = %conversation.id,
            %model,
            rounds,
            bubbles = bubbles.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn complete"
        );

        Ok(TurnOutcome {
            conversation_id: conversation.id,
            message_ids,
            bubbles,
        })
    }
}

async fn emit(sink: &Option<mpsc::Sender<TurnEvent>>, event: TurnEvent) {
    if let Some(tx) = sink {
        // A dropped receiver (client disconnect) must not abort the turn —
        // persistence continues regardless.
        let _ = tx.send(event).await;
    }
}

/// Map persisted messages into the OpenAI chat format, rewriting reply-to
/// user messages and appending attachment summaries.
fn build_history(messages: &[Message]) -> Vec<serde_json::Value> {
    let by_id: HashMap<&str, &Message> =
        messages.iter().map(|m| (m.id.as_str(), m)).collect();

    messages
        .iter()
        .map(|m| {
            let content = match m.role {
                Role::User => {
                    let mut content = m.content.clone();
                    if !m.attachments.is_empty() {
                        content.push_str(&format_attachments(&m.attachments));
                    }
                    if let Some(replied) = m
                        .reply_to_message_id
                        .as_deref()
                        .and_then(|id| by_id.get(id))
                    {
                        content = format!(
                            "Context from replied message: \"{}\"\n\nUser reply: {content}",
                            compact_preview(&replied.content, REPLY_PREVIEW_CHARS)
                        );
                    }
                    content
                }
                Role::Assistant | Role::System => m.content.clone(),
            };
            serde_json::json!({ "role": m.role.as_str(), "content": content })
        })
        .collect()
}

/// Human-readable attachment block appended to a user message.
fn format_attachments(attachments: &[Attachment]) -> String {
    let mut out = String::from("\n\n[Attachments]");
    for a in attachments {
        match a.kind {
            AttachmentKind::Image => {
                out.push_str(&format!(
                    "\n- {} ({}, {} bytes): image file attached by user",
                    a.name, a.mime, a.size
                ));
            }
            AttachmentKind::Text => {
                let excerpt = a
                    .text_excerpt
                    .as_deref()
                    .map(|t| compact_chars(t, ATTACHMENT_EXCERPT_CHARS))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "\n- {} ({}, {} bytes):\n{excerpt}",
                    a.name, a.mime, a.size
                ));
            }
            AttachmentKind::Binary => {
                out.push_str(&format!(
                    "\n- {} ({}, {} bytes): binary file attached by user",
                    a.name, a.mime, a.size
                ));
            }
        }
    }
    out
}

/// Remove `<think>…</think>` blocks and stray think tags.
fn strip_think_tags(content: &str) -> String {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    let block = BLOCK.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
    let tag = TAG.get_or_init(|| Regex::new(r"</?think>").unwrap());
    let without_blocks = block.replace_all(content, "");
    tag.replace_all(&without_blocks, "").trim().to_string()
}

/// Whitespace-collapsed preview capped at `max` chars.
fn compact_preview(text: &str, max: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    compact_chars(&collapsed, max)
}

/// First `max` chars of `text`, char-boundary safe.
fn compact_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Split into fixed-size char chunks for paced token streaming.
fn chunk_chars(text: &str, size: usize) -> Vec<String> {
    text.chars()
        .collect::<Vec<_>>()
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
