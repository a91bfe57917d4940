//! chat-relay server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use chat_relay::app_state::AppState;
use chat_relay::auth::TokenGate;
use chat_relay::config::{LogFormat, RelayConfig};
use chat_relay::domain::Hub;
use chat_relay::persistence::memory::{InMemoryDirectory, InMemoryMessageStore};
use chat_relay::persistence::postgres::PostgresPersistence;
use chat_relay::persistence::{IdentityDirectory, MessageStore};
use chat_relay::service::DeliveryService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config =
        RelayConfig::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting chat-relay");
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set, using the development secret");
    }

    // Build persistence collaborators
    let (directory, store): (Arc<dyn IdentityDirectory>, Arc<dyn MessageStore>) =
        if config.persistence_enabled {
            let pg = PostgresPersistence::connect(&config)
                .await
                .context("connecting to PostgreSQL")?;
            pg.migrate().await.context("running migrations")?;
            tracing::info!("PostgreSQL persistence ready");
            let pg = Arc::new(pg);
            (Arc::clone(&pg) as Arc<dyn IdentityDirectory>, pg)
        } else {
            tracing::warn!("persistence disabled, messages are kept in memory only");
            (
                Arc::new(InMemoryDirectory::from_seed(&config.dev_users)),
                Arc::new(InMemoryMessageStore::new()),
            )
        };

    // Build domain and service layers
    let hub = Arc::new(Hub::new());
    let delivery = Arc::new(DeliveryService::new(
        hub,
        directory,
        store,
        config.persist_timeout(),
    ));

    let app_state = AppState {
        delivery,
        token_gate: TokenGate::new(config.jwt_secret.as_bytes()),
        outbound_queue_capacity: config.outbound_queue_capacity,
    };
    let app = chat_relay::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
