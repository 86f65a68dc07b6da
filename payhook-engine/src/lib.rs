//! The convergence engine, the ingestion pipeline wiring verification,
//! dedupe and parsing together, and the reconciler. This crate owns
//! correctness-under-retry and is the only place where concurrent
//! deliveries, cryptographic verification and monotonic state transitions
//! interact.

pub mod cancel;
pub mod config;
mod engine;
mod error;
mod pipeline;
mod reconcile;
mod refund;

pub use cancel::CancelToken;
pub use config::{EngineConfig, Module, ModuleFlags};
pub use engine::Engine;
pub use error::EngineError;
pub use pipeline::{ingest, IngestError, IngestOutcome};
pub use reconcile::{reconcile, ReconciliationResult};
pub use refund::{create_refund_request, RefundRequestError};
