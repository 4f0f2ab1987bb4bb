//! Front-channel lifecycle.
//!
//! Holds the singleton Telegram adapter handle; repeated start requests
//! de-duplicate onto the one running instance. WhatsApp is a recognised
//! channel value but no adapter ships, so its status is always
//! unconfigured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use shrimp_telegram::TelegramDeps;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelState {
    pub configured: bool,
    pub running: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelsStatus {
    pub telegram: ChannelState,
    pub whatsapp: ChannelState,
}

pub struct ChannelManager {
    telegram_token: Option<String>,
    telegram_deps: Arc<TelegramDeps>,
    telegram_running: AtomicBool,
    /// Serializes start attempts so concurrent calls share one outcome.
    start_lock: Mutex<()>,
}

impl ChannelManager {
    pub fn new(telegram_token: Option<String>, telegram_deps: Arc<TelegramDeps>) -> Self {
        Self {
            telegram_token,
            telegram_deps,
            telegram_running: AtomicBool::new(false),
            start_lock: Mutex::new(()),
        }
    }

    pub fn status(&self) -> ChannelsStatus {
        ChannelsStatus {
            telegram: ChannelState {
                configured: self.telegram_token.is_some(),
                running: self.telegram_running.load(Ordering::Acquire),
            },
            whatsapp: ChannelState {
                configured: false,
                running: false,
            },
        }
    }

    /// Start the named channel. `all` starts everything configured. Repeated
    /// calls while a start is in flight collapse onto the same outcome.
    pub async fn start(&self, channel: &str) -> Result<ChannelsStatus, String> {
        match channel {
            "telegram" => self.start_telegram().await?,
            "whatsapp" => return Err("whatsapp adapter is not available".to_string()),
            "all" => {
                if self.telegram_token.is_some() {
                    self.start_telegram().await?;
                }
            }
            other => return Err(format!("unknown channel: {other}")),
        }
        Ok(self.status())
    }

    async fn start_telegram(&self) -> Result<(), String> {
        let _guard = self.start_lock.lock().await;
        if self.telegram_running.load(Ordering::Acquire) {
            return Ok(());
        }
        let token = self
            .telegram_token
            .clone()
            .ok_or_else(|| "telegram is not configured (TELEGRAM_BOT_TOKEN)".to_string())?;

        let deps = Arc::clone(&self.telegram_deps);
        tokio::spawn(async move {
            shrimp_telegram::run(token, deps).await;
        });
        self.telegram_running.store(true, Ordering::Release);
        info!("telegram channel started");
        Ok(())
    }
}
