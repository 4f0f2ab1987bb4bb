//! Message edit/delete routes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::app::AppState;

use super::{bad_request, store_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub content: String,
}

pub async fn edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<EditRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(bad_request("content must not be empty"));
    }
    state
        .store
        .update_message_content(&id, &req.content)
        .map_err(store_error)?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete_message(&id).map_err(store_error)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
