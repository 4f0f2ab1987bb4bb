//! Trigger-run routes.

use std::str::FromStr;
use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use shrimp_agent::{TriggerRequest, TurnError};
use shrimp_store::{TriggerKind, TriggerRun};

use crate::app::AppState;

use super::{bad_request, internal_error, store_error, ApiError};

/// How many runs the listing returns.
const LIST_LIMIT: usize = 50;

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TriggerRun>>, ApiError> {
    state
        .store
        .list_trigger_runs(LIST_LIMIT)
        .map(Json)
        .map_err(store_error)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub message: String,
    pub model: Option<String>,
    /// Defaults to "api" when omitted.
    pub trigger: Option<String>,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub run: TriggerRun,
    pub conversation_id: String,
    pub final_result: Option<String>,
    pub result_preview: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<CreateJobResponse>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let trigger = match req.trigger.as_deref() {
        None => TriggerKind::Api,
        Some(raw) => TriggerKind::from_str(raw).map_err(bad_request)?,
    };

    let outcome = state
        .trigger
        .run(TriggerRequest {
            message: req.message,
            model: req.model,
            trigger,
            payload: req.payload,
        })
        .await
        .map_err(|e| match e {
            TurnError::BadRequest(message) => bad_request(message),
            TurnError::Store(e) => store_error(e),
            TurnError::Upstream(e) => internal_error(e.to_string()),
        })?;

    Ok(Json(CreateJobResponse {
        run: outcome.run,
        conversation_id: outcome.conversation_id,
        final_result: outcome.final_result,
        result_preview: outcome.result_preview,
    }))
}
