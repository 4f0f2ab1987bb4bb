use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use shrimp_gateway::{app, channels};

use shrimp_agent::memory::PromptMemory;
use shrimp_agent::openai::OpenAiProvider;
use shrimp_agent::provider::{AssistantReply, ChatProvider, ChatRequest, ProviderError};
use shrimp_agent::tools::ToolRegistry;
use shrimp_agent::{ModelPolicy, TriggerExecutor, TurnOrchestrator};
use shrimp_core::config::SWEEP_INTERVAL_MS;
use shrimp_core::ShrimpConfig;
use shrimp_shell::{ShellManager, ShellManagerConfig};
use shrimp_store::Store;
use shrimp_telegram::TelegramDeps;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shrimp=info,shrimp_gateway=info,tower_http=warn".into()),
        )
        .init();

    // config: explicit path via SHRIMP_CONFIG > ./shrimp.toml > env vars
    let config_path = std::env::var("SHRIMP_CONFIG").ok();
    let config = ShrimpConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        ShrimpConfig::default()
    });

    info!(path = %config.db_path, "opening SQLite database");
    let store = Arc::new(Store::open(&config.db_path)?);

    let shell = Arc::new(ShellManager::new(ShellManagerConfig {
        max_sessions: config.max_sessions,
        default_timeout_ms: config.command_timeout_ms,
        max_output_chars: config.max_output_chars,
        ..Default::default()
    }));
    let memory = Arc::new(PromptMemory::new(&config.memory_path));

    let provider: Arc<dyn ChatProvider> = if config.openai.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set — chat turns will return errors");
        Arc::new(NullProvider)
    } else {
        Arc::new(OpenAiProvider::new(
            config.openai.api_key.clone(),
            config.openai.base_url.clone(),
        ))
    };

    let orchestrator = Arc::new(TurnOrchestrator::new(
        Arc::clone(&store),
        provider,
        ToolRegistry::new(Arc::clone(&shell), Arc::clone(&memory)),
        memory,
        ModelPolicy {
            default_model: config.openai.model.clone(),
            allowed: config.openai.allowed_models.clone(),
        },
    ));
    let trigger = Arc::new(TriggerExecutor::new(
        Arc::clone(&store),
        Arc::clone(&orchestrator),
    ));

    let telegram_deps = Arc::new(TelegramDeps {
        store: Arc::clone(&store),
        orchestrator: Arc::clone(&orchestrator),
    });
    let channels =
        channels::ChannelManager::new(config.telegram.bot_token.clone(), telegram_deps);
    if config.telegram.bot_token.is_some() {
        if let Err(e) = channels.start("telegram").await {
            warn!("telegram autostart failed: {e}");
        }
    }

    // Background TTL sweep for idle shell sessions.
    let sweeper = Arc::clone(&shell);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(SWEEP_INTERVAL_MS));
        loop {
            interval.tick().await;
            let removed = sweeper.sweep();
            if removed > 0 {
                info!(removed, "shell session sweep");
            }
        }
    });

    let bind = config.bind.clone();
    let port = config.port;
    let state = Arc::new(app::AppState {
        config,
        store,
        shell,
        orchestrator,
        trigger,
        channels,
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("shrimp gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Placeholder provider when no API key is available.
struct NullProvider;

#[async_trait::async_trait]
impl ChatProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn complete(
        &self,
        _req: &ChatRequest,
    ) -> Result<Option<AssistantReply>, ProviderError> {
        Err(ProviderError::Api {
            status: 503,
            message: "no LLM provider configured — set OPENAI_API_KEY".into(),
        })
    }
}
