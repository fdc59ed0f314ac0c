//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! BOT_TOKEN=... cargo run -p chat-gateway
//! ```
//!
//! Connects every configured shard and logs each event until Ctrl-C.
//! Configuration is loaded from environment variables.

use std::sync::Arc;

use anyhow::Context;
use chat_common::{try_init_tracing, ClientConfig, Environment, SettingsStore, TracingConfig};
use chat_gateway::{GatewayEndpoint, GatewayError, ShardEvent, ShardManager};
use chat_http::{GatewayUrlProvider, RestClient, StaticGatewayUrl};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Failed to load configuration")?;

    let tracing_config = match config.app.env {
        Environment::Production => TracingConfig::production(),
        Environment::Staging => TracingConfig::default(),
        Environment::Development => TracingConfig::development(),
    };
    let format = std::env::var("LOG_FORMAT").ok();
    if let Err(e) = try_init_tracing(tracing_config.with_format(format.as_deref())) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        shard_id = config.shard.id,
        shard_count = config.shard.count,
        "Starting gateway client"
    );

    let manager = build_manager(&config)?;
    for shard in manager.shards() {
        spawn_event_logger(shard.shard().id, shard.subscribe());
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        shutdown.cancel();
    });

    match manager.connect_all(&cancel).await {
        Ok(()) => {
            info!(shards = manager.shards().len(), "All shards connected");
            cancel.cancelled().await;
        }
        Err(GatewayError::Cancelled) => {}
        Err(e) => {
            manager.disconnect_all().await;
            return Err(e).context("Gateway connection failed");
        }
    }

    manager.disconnect_all().await;
    info!("Gateway client stopped");
    Ok(())
}

fn build_manager(config: &ClientConfig) -> anyhow::Result<ShardManager> {
    let provider: Arc<dyn GatewayUrlProvider> = match &config.gateway.url_override {
        Some(url) => Arc::new(StaticGatewayUrl::new(url.clone())),
        None => Arc::new(
            RestClient::new(&config.api.base_url, &config.bot.token)
                .context("Failed to build REST client")?,
        ),
    };

    let mut endpoint = GatewayEndpoint::new(provider, config.gateway.version);
    if let Some(path) = &config.storage.settings_path {
        let settings = SettingsStore::open(path)
            .with_context(|| format!("Failed to open settings at {}", path.display()))?;
        endpoint = endpoint.with_settings(Arc::new(settings));
    }

    Ok(ShardManager::new(
        &config.bot,
        config.shard,
        Arc::new(endpoint),
        &config.cache,
    ))
}

fn spawn_event_logger(shard_id: u32, mut events: tokio::sync::broadcast::Receiver<ShardEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ShardEvent::Failed(failure)) => {
                    error!(shard_id, reason = %failure.reason, message = %failure.message, "Shard failed");
                }
                Ok(event) => {
                    info!(
                        shard_id,
                        event = event.name(),
                        guild_id = ?event.guild_id(),
                        "Gateway event"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(shard_id, skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
