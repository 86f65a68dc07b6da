//! The convergence engine's own error enum: every variant here always
//! terminates in a `WebhookEventOutcome{succeeded: false, ..}` via
//! [`crate::pipeline::ingest`] — it never escapes `Engine::process` as a
//! propagated exception.

use payhook_core::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Id resolution could not find a provider-id to
    /// apply the event against, even after the thin-event fallback lookup.
    #[error("event carries no resolvable linked id for its target record")]
    MissingLinkedId,
    /// Record lookup found no record for the resolved
    /// provider-id or, if present, the parsed business id.
    #[error("no record found for the resolved id")]
    RecordNotFound,
    /// A dedupe, record or object-lookup store call failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}
