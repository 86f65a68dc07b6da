//! Builds the `axum::Router` and its middleware stack: a body-size limit, a
//! handling timeout, and request/response tracing. No mTLS, no attestation
//! layer — this server's contract is plain HTTP.

use std::time::Duration;

use axum::routing::post;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::routes::{reconcile, refund, webhook};
use crate::state::AppState;

/// Defaults conservative enough for a reference deployment, tunable by
/// callers who embed this router in a larger service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LayerConfig {
    /// Maximum request body size in bytes.
    pub body_limit: usize,
    /// Maximum time a handler may take before the request is aborted.
    pub handling_timeout: Duration,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            // Webhook payloads are small JSON documents; 1MiB is generous.
            body_limit: 1024 * 1024,
            handling_timeout: Duration::from_secs(15),
        }
    }
}

pub fn build_router(state: AppState, layer_config: LayerConfig) -> Router {
    Router::new()
        .route("/webhooks/stripe", post(webhook::webhook))
        .route("/reconcile", post(reconcile::reconcile_endpoint))
        .route("/refunds", post(refund::create_refund))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(layer_config.handling_timeout))
        .layer(RequestBodyLimitLayer::new(layer_config.body_limit))
}
