//! Telegram front channel: long-poll inbound messages, route them through
//! the turn engine, and send each assistant bubble back as its own reply.

mod handler;
mod send;

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::info;

use shrimp_agent::TurnOrchestrator;
use shrimp_store::Store;

/// Everything the adapter needs from the rest of the process.
pub struct TelegramDeps {
    pub store: Arc<Store>,
    pub orchestrator: Arc<TurnOrchestrator>,
}

/// Start the long-poll loop. Runs until the process exits.
pub async fn run(bot_token: String, deps: Arc<TelegramDeps>) {
    let bot = Bot::new(bot_token);
    info!("telegram adapter started");

    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let deps = Arc::clone(&deps);
        async move {
            handler::handle_message(bot, msg, deps).await;
            respond(())
        }
    })
    .await;
}
