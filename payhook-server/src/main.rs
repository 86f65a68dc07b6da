//! The reference server binary: reads `EngineConfig`/provider credentials
//! from the environment, builds the router, and serves it until SIGINT. A
//! thin `main.rs` that wires config, logging and the server future
//! together, one level above `lib.rs`.

use anyhow::Context;
use payhook_client::HttpProviderClient;
use payhook_engine::EngineConfig;
use payhook_server::state::AppStateInner;
use payhook_server::{build_router, LayerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env().context("failed to load configuration")?;
    let bind_addr = config.bind_addr;

    let provider_base_url =
        std::env::var("PAYHOOK_PROVIDER_BASE_URL").unwrap_or_else(|_| "https://api.stripe.com/v1".to_string());
    let provider_api_key = std::env::var("PAYHOOK_PROVIDER_API_KEY").context("PAYHOOK_PROVIDER_API_KEY must be set")?;
    let webhook_secret = std::env::var("PAYHOOK_WEBHOOK_SECRET").context("PAYHOOK_WEBHOOK_SECRET must be set")?;

    let provider = HttpProviderClient::new(provider_base_url, provider_api_key);
    let state = std::sync::Arc::new(AppStateInner::new(config, provider, webhook_secret.into_bytes()));

    let router = build_router(state, LayerConfig::default());
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "payhook-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received shutdown signal");
}
