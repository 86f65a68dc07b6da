//! A reference `axum` HTTP server exposing the webhook, reconcile and
//! refund endpoints, wiring the verifier, dedupe store, parser, convergence
//! engine and reconciler together against the in-memory reference stores
//! and a real `HttpProviderClient`.

pub mod app;
mod error;
pub mod routes;
pub mod state;

pub use app::{build_router, LayerConfig};
pub use state::{AppState, AppStateInner};
