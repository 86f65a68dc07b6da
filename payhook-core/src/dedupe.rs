//! The per-`event_id` dedupe state machine and its recorded outcome.
//! `WebhookEventEntry` is the record; the state machine itself lives in
//! `payhook-store`'s `EventDedupeStore` trait.

use serde::{Deserialize, Serialize};

use crate::time::UnixTime;

/// The state of a single `event_id` in the dedupe store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DedupeState {
    Processing,
    Succeeded,
    Failed,
}

/// The result recorded for a terminal (`Succeeded` or `Failed`) dedupe
/// entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventOutcome {
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub recorded_at: UnixTime,
}

impl WebhookEventOutcome {
    pub fn success(recorded_at: UnixTime) -> Self {
        Self {
            succeeded: true,
            error_message: None,
            recorded_at,
        }
    }

    pub fn failure(error_message: impl Into<String>, recorded_at: UnixTime) -> Self {
        Self {
            succeeded: false,
            error_message: Some(error_message.into()),
            recorded_at,
        }
    }
}

/// A single `event_id`'s dedupe/lease record.
///
/// `state == Succeeded` iff `outcome.succeeded == true`. This
/// is enforced by construction: the only way to reach [`DedupeState::Succeeded`]
/// or [`DedupeState::Failed`] is via [`WebhookEventEntry::with_outcome`],
/// which derives the state from the outcome itself.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventEntry {
    pub event_id: String,
    pub state: DedupeState,
    pub started_at: UnixTime,
    pub outcome: Option<WebhookEventOutcome>,
}

impl WebhookEventEntry {
    /// A fresh lease: `event_id` is now `Processing` as of `started_at`.
    pub fn processing(event_id: impl Into<String>, started_at: UnixTime) -> Self {
        Self {
            event_id: event_id.into(),
            state: DedupeState::Processing,
            started_at,
            outcome: None,
        }
    }

    /// Moves this entry to its terminal state, preserving `started_at` from
    /// the existing entry.
    pub fn with_outcome(mut self, outcome: WebhookEventOutcome) -> Self {
        self.state = if outcome.succeeded {
            DedupeState::Succeeded
        } else {
            DedupeState::Failed
        };
        self.outcome = Some(outcome);
        self
    }

    /// Whether a fresh `try_begin` may take over this entry: the lease has
    /// aged past `lease` since `started_at`.
    pub fn lease_expired(&self, now: UnixTime, lease: std::time::Duration) -> bool {
        now.saturating_duration_since(self.started_at) >= lease
    }
}
