//! Shared server state: one `Engine` wired against the in-memory reference
//! record/dedupe stores and the real [`HttpProviderClient`] for object
//! lookup and event listing. A single `Arc`-wrapped state struct is handed
//! to every route via `axum::State`.

use std::sync::Arc;

use payhook_client::HttpProviderClient;
use payhook_engine::{CancelToken, Engine, EngineConfig};
use payhook_store::dedupe::InMemoryDedupeStore;
use payhook_store::records::{InMemoryPaymentStore, InMemoryRefundStore, InMemorySubscriptionStore};

pub type ServerEngine = Engine<InMemoryPaymentStore, InMemorySubscriptionStore, InMemoryRefundStore, HttpProviderClient>;

/// Everything a route handler needs, cheaply cloneable via `Arc`.
pub struct AppStateInner {
    pub engine: ServerEngine,
    pub dedupe: InMemoryDedupeStore,
    pub provider: HttpProviderClient,
    pub webhook_secret: Vec<u8>,
    /// Cancelled when the server begins a graceful shutdown; handlers
    /// `tokio::select!` in-flight store calls against it instead of relying
    /// on ambient request-cancellation.
    pub shutdown: CancelToken,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(config: EngineConfig, provider: HttpProviderClient, webhook_secret: Vec<u8>) -> Self {
        let engine = Engine::new(
            config,
            InMemoryPaymentStore::new(),
            InMemorySubscriptionStore::new(),
            InMemoryRefundStore::new(),
            provider.clone(),
        );
        Self {
            engine,
            dedupe: InMemoryDedupeStore::new(),
            provider,
            webhook_secret,
            shutdown: CancelToken::new(),
        }
    }
}
