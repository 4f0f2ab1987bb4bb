//! Channel status and start routes.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::channels::ChannelsStatus;

use super::{bad_request, ApiError};

pub async fn status(State(state): State<Arc<AppState>>) -> Json<ChannelsStatus> {
    Json(state.channels.status())
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub channel: String,
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<ChannelsStatus>, ApiError> {
    state
        .channels
        .start(&req.channel)
        .await
        .map(Json)
        .map_err(bad_request)
}
