//! Runtime diagnostics.

use std::sync::Arc;

use axum::{extract::State, Json};

use shrimp_core::platform::{default_shell, Platform};
use shrimp_shell::SessionInfo;

use crate::app::AppState;

pub async fn runtime_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let platform = Platform::current();
    let db_status = match state.store.ping() {
        Ok(()) => "ok",
        Err(_) => "error",
    };
    let hostname = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    Json(serde_json::json!({
        "platform": platform.as_str(),
        "shell": default_shell(platform),
        "hostname": hostname,
        "dbPath": state.config.db_path,
        "dbStatus": db_status,
        "defaultModel": state.config.openai.model,
        "allowedModels": state.config.openai.allowed_models,
        "activeShellSessions": state.shell.list(),
    }))
}

pub async fn shell_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    Json(state.shell.list())
}
