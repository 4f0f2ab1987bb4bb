use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use shrimp_agent::{TriggerExecutor, TurnOrchestrator};
use shrimp_core::ShrimpConfig;
use shrimp_shell::ShellManager;
use shrimp_store::Store;

use crate::channels::ChannelManager;
use crate::http;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ShrimpConfig,
    pub store: Arc<Store>,
    pub shell: Arc<ShellManager>,
    pub orchestrator: Arc<TurnOrchestrator>,
    pub trigger: Arc<TriggerExecutor>,
    pub channels: ChannelManager,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat/stream", post(http::chat::chat_stream))
        .route(
            "/api/conversations",
            get(http::conversations::list).post(http::conversations::create),
        )
        .route(
            "/api/conversations/{id}",
            get(http::conversations::detail)
                .patch(http::conversations::rename)
                .delete(http::conversations::remove),
        )
        .route(
            "/api/messages/{id}",
            patch(http::messages::edit).delete(http::messages::remove),
        )
        .route("/api/runtime", get(http::runtime::runtime_info))
        .route("/api/shell/sessions", get(http::runtime::shell_sessions))
        .route("/api/channels/status", get(http::channels::status))
        .route("/api/channels/start", post(http::channels::start))
        .route(
            "/api/jobs",
            get(http::jobs::list).post(http::jobs::create),
        )
        .with_state(state)
}
