//! Shared shapes for talking to the provider's event-listing API:
//! kept here, rather than in the client crate, so the reconciler (in
//! `payhook-engine`) can name them without depending on any particular
//! HTTP client implementation.

use serde_json::Value;

use crate::time::UnixTime;

/// Pagination input for a single `list_events` call.
#[derive(Clone, Debug)]
pub struct EventListParams {
    pub limit: u32,
    pub created_after: UnixTime,
    pub starting_after_event_id: Option<String>,
}

/// One page of provider events, in the provider's own SDK-typed-event
/// shape (i.e. ready for `payhook_verify::parse_from_envelope`).
#[derive(Debug, Default)]
pub struct EventPage {
    pub events: Vec<Value>,
    pub has_more: bool,
    pub last_event_id: Option<String>,
}
