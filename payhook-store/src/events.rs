//! The reconciler's provider-facing dependency: paginated listing of recent
//! webhook events, filtered to the event types the convergence engine's
//! dispatch table recognizes. Kept as its own trait, separate from
//! [`crate::lookup::ObjectLookup`], since a persistent deployment may want to
//! cache or rate-limit listing independently of the thin-event fallback path.

use async_trait::async_trait;
use payhook_core::error::StoreError;
use payhook_core::provider::{EventListParams, EventPage};

/// Paginated event listing against the provider. `payhook-client`
/// implements this against the real provider; tests use an in-memory stub.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn list_events(&self, params: &EventListParams) -> Result<EventPage, StoreError>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod stub {
    use std::sync::Mutex;

    use serde_json::Value;

    use super::*;

    /// An in-memory stub that serves a fixed, pre-seeded sequence of pages,
    /// ignoring `params` beyond recording the calls it received (tests assert
    /// on `calls()` to check paging was driven correctly).
    #[derive(Default)]
    pub struct StubEventSource {
        pages: Mutex<Vec<EventPage>>,
        calls: Mutex<Vec<Option<String>>>,
    }

    impl StubEventSource {
        /// Pages are served in the order given, oldest call first.
        pub fn new(pages: Vec<(Vec<Value>, bool, Option<String>)>) -> Self {
            let pages = pages
                .into_iter()
                .map(|(events, has_more, last_event_id)| EventPage {
                    events,
                    has_more,
                    last_event_id,
                })
                .collect();
            Self {
                pages: Mutex::new(pages),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<Option<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSource for StubEventSource {
        async fn list_events(&self, params: &EventListParams) -> Result<EventPage, StoreError> {
            self.calls
                .lock()
                .unwrap()
                .push(params.starting_after_event_id.clone());
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(EventPage {
                    events: Vec::new(),
                    has_more: false,
                    last_event_id: None,
                });
            }
            Ok(pages.remove(0))
        }
    }

    /// A stub whose single call always fails, for exercising `StoreUnavailable`
    /// propagation out of the reconciler.
    #[derive(Default)]
    pub struct FailingEventSource;

    #[async_trait]
    impl EventSource for FailingEventSource {
        async fn list_events(&self, _params: &EventListParams) -> Result<EventPage, StoreError> {
            Err(StoreError::unavailable("provider unreachable"))
        }
    }
}
