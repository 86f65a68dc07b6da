//! The event dedupe store. A single async trait with one in-memory
//! reference implementation guarding the per-`event_id` state machine
//! behind a per-key critical section.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use payhook_core::dedupe::{DedupeState, WebhookEventEntry, WebhookEventOutcome};
use payhook_core::error::StoreError;
use payhook_core::time::UnixTime;
use tokio::sync::Mutex;

/// The default processing lease: how long an event id stays claimed by a
/// `Processing` entry before another delivery may take it over.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(5 * 60);

/// Per-`event_id` dedupe state with a time-bounded processing lease. All
/// three operations are serializable against each other per `event_id`.
#[async_trait]
pub trait EventDedupeStore: Send + Sync {
    /// Atomic test-and-set. Returns `true` iff the entry was absent, in
    /// `Failed`, or in `Processing` with an expired lease; in those cases
    /// the entry is (re)written to `Processing` with `started_at = now`.
    async fn try_begin(&self, event_id: &str, now: UnixTime, lease: Duration) -> Result<bool, StoreError>;

    /// Unconditional write of the terminal state implied by `outcome`,
    /// preserving `started_at` from the existing entry.
    async fn record_outcome(
        &self,
        event_id: &str,
        outcome: WebhookEventOutcome,
    ) -> Result<(), StoreError>;

    /// The last recorded outcome, or `None` if the entry is absent or still
    /// `Processing`.
    async fn get_outcome(&self, event_id: &str) -> Result<Option<WebhookEventOutcome>, StoreError>;
}

/// In-memory reference implementation: a single [`Mutex`] guards the whole
/// map, so `try_begin`'s read-then-write is atomic by construction rather
/// than by a separate per-key lock table.
#[derive(Clone, Default)]
pub struct InMemoryDedupeStore {
    entries: Arc<Mutex<HashMap<String, WebhookEventEntry>>>,
}

impl InMemoryDedupeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventDedupeStore for InMemoryDedupeStore {
    async fn try_begin(&self, event_id: &str, now: UnixTime, lease: Duration) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let may_begin = match entries.get(event_id) {
            None => true,
            Some(entry) => match entry.state {
                DedupeState::Failed => true,
                DedupeState::Succeeded => false,
                DedupeState::Processing => entry.lease_expired(now, lease),
            },
        };
        if may_begin {
            entries.insert(
                event_id.to_string(),
                WebhookEventEntry::processing(event_id, now),
            );
        }
        Ok(may_begin)
    }

    async fn record_outcome(
        &self,
        event_id: &str,
        outcome: WebhookEventOutcome,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let started_at = entries
            .get(event_id)
            .map(|entry| entry.started_at)
            .unwrap_or(outcome.recorded_at);
        entries.insert(
            event_id.to_string(),
            WebhookEventEntry::processing(event_id, started_at).with_outcome(outcome),
        );
        Ok(())
    }

    async fn get_outcome(&self, event_id: &str) -> Result<Option<WebhookEventOutcome>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(event_id).and_then(|e| e.outcome.clone()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn outcome(succeeded: bool, at: i64) -> WebhookEventOutcome {
        if succeeded {
            WebhookEventOutcome::success(UnixTime::from_secs(at))
        } else {
            WebhookEventOutcome::failure("boom", UnixTime::from_secs(at))
        }
    }

    #[tokio::test]
    async fn fresh_event_id_may_begin() {
        let store = InMemoryDedupeStore::new();
        assert!(store
            .try_begin("evt_1", UnixTime::from_secs(1000), DEFAULT_LEASE)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn processing_entry_rejects_concurrent_begin_within_lease() {
        let store = InMemoryDedupeStore::new();
        assert!(store
            .try_begin("evt_1", UnixTime::from_secs(1000), DEFAULT_LEASE)
            .await
            .unwrap());
        assert!(!store
            .try_begin("evt_1", UnixTime::from_secs(1030), DEFAULT_LEASE)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn expired_lease_allows_takeover() {
        let store = InMemoryDedupeStore::new();
        let lease = Duration::from_secs(60);
        assert!(store
            .try_begin("evt_1", UnixTime::from_secs(1000), lease)
            .await
            .unwrap());
        assert!(store
            .try_begin("evt_1", UnixTime::from_secs(1061), lease)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn succeeded_entry_never_reopens() {
        let store = InMemoryDedupeStore::new();
        store
            .try_begin("evt_1", UnixTime::from_secs(1000), DEFAULT_LEASE)
            .await
            .unwrap();
        store
            .record_outcome("evt_1", outcome(true, 1001))
            .await
            .unwrap();
        assert!(!store
            .try_begin("evt_1", UnixTime::from_secs(999_999), DEFAULT_LEASE)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn failed_entry_may_be_retried_immediately() {
        let store = InMemoryDedupeStore::new();
        store
            .try_begin("evt_1", UnixTime::from_secs(1000), DEFAULT_LEASE)
            .await
            .unwrap();
        store
            .record_outcome("evt_1", outcome(false, 1001))
            .await
            .unwrap();
        assert!(store
            .try_begin("evt_1", UnixTime::from_secs(1002), DEFAULT_LEASE)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn get_outcome_is_none_while_processing() {
        let store = InMemoryDedupeStore::new();
        store
            .try_begin("evt_1", UnixTime::from_secs(1000), DEFAULT_LEASE)
            .await
            .unwrap();
        assert_eq!(store.get_outcome("evt_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_try_begin_exactly_one_winner() {
        let store = InMemoryDedupeStore::new();
        let store = Arc::new(store);
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .try_begin("evt_race", UnixTime::from_secs(1000), DEFAULT_LEASE)
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.get_outcome("evt_race").await.unwrap(), None);
    }
}
