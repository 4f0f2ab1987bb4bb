//! Outbound delivery — one Telegram message per bubble.

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::warn;

pub async fn send_bubbles(bot: &Bot, chat_id: ChatId, bubbles: &[String]) {
    for bubble in bubbles {
        if bubble.trim().is_empty() {
            continue;
        }
        if let Err(e) = bot.send_message(chat_id, bubble).await {
            warn!(chat_id = chat_id.0, error = %e, "failed to send telegram message");
        }
    }
}
