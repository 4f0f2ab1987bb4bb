//! Conversation CRUD routes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use shrimp_store::{Conversation, Message, ToolCallRecord};

use crate::app::AppState;

use super::{bad_request, store_error, ApiError};

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    state
        .store
        .list_conversations()
        .map(Json)
        .map_err(store_error)
}

/// POST /api/conversations — a blank conversation with the default model.
pub async fn create(State(state): State<Arc<AppState>>) -> Result<Json<Conversation>, ApiError> {
    state
        .store
        .create_conversation(&state.config.openai.model, None)
        .map(Json)
        .map_err(store_error)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub tool_calls: Vec<ToolCallRecord>,
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let conversation = state.store.get_conversation(&id).map_err(store_error)?;
    let messages = state.store.list_messages(&id).map_err(store_error)?;
    let tool_calls = state.store.list_tool_calls(&id).map_err(store_error)?;
    Ok(Json(ConversationDetail {
        conversation,
        messages,
        tool_calls,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

pub async fn rename(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(bad_request("title must not be empty"));
    }
    state
        .store
        .rename_conversation(&id, title)
        .map(Json)
        .map_err(store_error)
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete_conversation(&id).map_err(store_error)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
