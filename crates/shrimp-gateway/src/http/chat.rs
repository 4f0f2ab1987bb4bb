//! POST /api/chat/stream — the SSE turn endpoint.
//!
//! Frames are `data: <json>\n\n` with a terminal `data: [DONE]\n\n`. The
//! turn keeps running (and persisting) even if the client goes away; the
//! cancellation token only aborts the loop between LLM rounds.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use axum::Json;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use shrimp_agent::{TurnEvent, TurnRequest};
use shrimp_store::Attachment;

use crate::app::AppState;

use super::{bad_request, ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStreamRequest {
    pub conversation_id: Option<String>,
    pub message: String,
    pub model: Option<String>,
    pub reply_to_message_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatStreamRequest>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let (tx, mut rx) = mpsc::channel::<TurnEvent>(64);
    let orchestrator = Arc::clone(&state.orchestrator);
    let cancel = CancellationToken::new();
    let turn = TurnRequest {
        conversation_id: req.conversation_id,
        message: req.message,
        model: req.model,
        reply_to_message_id: req.reply_to_message_id,
        attachments: req.attachments,
    };

    tokio::spawn(async move {
        // Failures already surface as an `error` event through the sink.
        if let Err(e) = orchestrator.run_turn(turn, Some(tx), cancel).await {
            warn!(error = %e, "streamed turn failed");
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(Event::default().data(json)),
                Err(e) => warn!(error = %e, "event serialization failed"),
            }
        }
        yield Ok(Event::default().data("[DONE]"));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
