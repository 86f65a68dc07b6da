//! The store-facing error type shared by every store trait in
//! `payhook-store` and folded into `payhook-engine`'s own error enum. Kept
//! here, rather than in `payhook-store`, so that `payhook-engine` can name
//! it without depending on any particular store implementation.

use thiserror::Error;

/// An error surfaced by a dedupe, record or object-lookup store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or returned an unexpected
    /// failure. Carries a human-readable cause for logging; callers that
    /// need to distinguish causes should match on the source store's own
    /// error type before it is converted into this one.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        Self::Unavailable(cause.to_string())
    }
}
