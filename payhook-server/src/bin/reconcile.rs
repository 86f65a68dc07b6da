//! A direct CLI entry point for the reconciler, exposing the same reconciliation logic
//! as the HTTP endpoint through a standalone binary. Invokes the reconciler
//! against a freshly configured provider and a fresh in-memory dedupe/record
//! set, and prints the `ReconciliationResult`.
//!
//! This is a standalone demonstration binary: a real deployment would wire
//! persistent stores instead of starting from empty ones on every run.

use anyhow::Context;
use payhook_client::HttpProviderClient;
use payhook_core::time::UnixTime;
use payhook_engine::{reconcile, CancelToken, EngineConfig};
use payhook_store::dedupe::InMemoryDedupeStore;
use payhook_store::records::{InMemoryPaymentStore, InMemoryRefundStore, InMemorySubscriptionStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env().context("failed to load configuration")?;
    let provider_base_url =
        std::env::var("PAYHOOK_PROVIDER_BASE_URL").unwrap_or_else(|_| "https://api.stripe.com/v1".to_string());
    let provider_api_key = std::env::var("PAYHOOK_PROVIDER_API_KEY").context("PAYHOOK_PROVIDER_API_KEY must be set")?;

    let provider = HttpProviderClient::new(provider_base_url, provider_api_key);
    let engine = payhook_engine::Engine::new(
        config.clone(),
        InMemoryPaymentStore::new(),
        InMemorySubscriptionStore::new(),
        InMemoryRefundStore::new(),
        provider.clone(),
    );
    let dedupe = InMemoryDedupeStore::new();
    let now = UnixTime::now();
    let created_after = config.reconcile_default_created_after(now);
    let cancel = CancelToken::new();

    let result = reconcile(
        &engine,
        &dedupe,
        &provider,
        config.reconcile_default_limit,
        created_after,
        None,
        now,
        &cancel,
    )
    .await
    .context("reconciliation pass failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
