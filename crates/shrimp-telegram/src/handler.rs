//! Inbound message handling.

use std::sync::Arc;

use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use shrimp_agent::TurnRequest;
use shrimp_store::Channel;

use crate::{send, TelegramDeps};

/// Handle one inbound Telegram message.
///
/// Bot senders and empty messages are ignored. The chat id maps to a
/// conversation through the channel-link table, so the whole chat shares one
/// transcript; the turn itself runs without a streaming sink and the bubbles
/// are delivered as separate replies when it finishes.
pub async fn handle_message(bot: Bot, msg: Message, deps: Arc<TelegramDeps>) {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return;
    }

    let text = msg.text().or(msg.caption()).unwrap_or("").trim();
    if text.is_empty() {
        return;
    }

    let external_chat_id = msg.chat.id.0.to_string();
    let model = deps.orchestrator.models().default_model.clone();

    let conversation = match deps.store.get_or_create_channel_conversation(
        Channel::Telegram,
        &external_chat_id,
        &model,
    ) {
        Ok(conversation) => conversation,
        Err(e) => {
            warn!(external_chat_id, error = %e, "channel conversation lookup failed");
            return;
        }
    };

    let request = TurnRequest {
        conversation_id: Some(conversation.id),
        message: text.to_string(),
        ..Default::default()
    };

    match deps
        .orchestrator
        .run_turn(request, None, CancellationToken::new())
        .await
    {
        Ok(outcome) => send::send_bubbles(&bot, msg.chat.id, &outcome.bubbles).await,
        Err(e) => {
            warn!(external_chat_id, error = %e, "telegram turn failed");
            send::send_bubbles(
                &bot,
                msg.chat.id,
                &[format!("Something went wrong: {e}")],
            )
            .await;
        }
    }
}
