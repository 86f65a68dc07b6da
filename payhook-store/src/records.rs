//! The three parallel record stores (payment, subscription, refund).
//! Each is its own single-method-set trait, but all three in-memory
//! reference implementations share one generic engine so that atomic
//! index maintenance is proven once rather than three times.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use payhook_core::error::StoreError;
use payhook_core::record::{PaymentRecord, RefundRecord, SubscriptionRecord};
use tokio::sync::Mutex;

/// Extracts the business-id (primary key) and provider-id (secondary index
/// key) of a record kind, so the generic in-memory engine below doesn't
/// need to know the concrete record type's field names.
trait RecordKeys {
    fn business_id(&self) -> &str;
    fn provider_id(&self) -> Option<&str>;
}

impl RecordKeys for PaymentRecord {
    fn business_id(&self) -> &str {
        &self.business_payment_id
    }
    fn provider_id(&self) -> Option<&str> {
        self.payment_intent_id.as_deref()
    }
}

impl RecordKeys for SubscriptionRecord {
    fn business_id(&self) -> &str {
        &self.business_subscription_id
    }
    fn provider_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }
}

impl RecordKeys for RefundRecord {
    fn business_id(&self) -> &str {
        &self.business_refund_id
    }
    fn provider_id(&self) -> Option<&str> {
        self.refund_id.as_deref()
    }
}

/// The primary map plus the secondary provider-id index, guarded by one
/// [`Mutex`] so a `save` can maintain both atomically.
struct RecordStoreData<R> {
    by_business_id: HashMap<String, R>,
    provider_id_index: HashMap<String, String>,
}

impl<R> Default for RecordStoreData<R> {
    fn default() -> Self {
        Self {
            by_business_id: HashMap::new(),
            provider_id_index: HashMap::new(),
        }
    }
}

struct GenericRecordStore<R> {
    data: Mutex<RecordStoreData<R>>,
}

impl<R> Default for GenericRecordStore<R> {
    fn default() -> Self {
        Self {
            data: Mutex::new(RecordStoreData::default()),
        }
    }
}

impl<R: RecordKeys + Clone> GenericRecordStore<R> {
    async fn save(&self, record: R) -> Result<(), StoreError> {
        if record.business_id().is_empty() {
            return Err(StoreError::unavailable("business id must not be empty"));
        }
        let mut data = self.data.lock().await;

        // Drop the previous provider-id mapping before installing the
        // new one, so the index never holds a stale or dangling entry.
        if let Some(previous) = data.by_business_id.get(record.business_id()) {
            if let Some(previous_provider_id) = previous.provider_id() {
                if Some(previous_provider_id) != record.provider_id() {
                    data.provider_id_index.remove(previous_provider_id);
                }
            }
        }
        if let Some(provider_id) = record.provider_id() {
            data.provider_id_index
                .insert(provider_id.to_string(), record.business_id().to_string());
        }
        data.by_business_id
            .insert(record.business_id().to_string(), record);
        Ok(())
    }

    async fn get_by_business_id(&self, id: &str) -> Result<Option<R>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.by_business_id.get(id).cloned())
    }

    async fn get_by_provider_id(&self, id: &str) -> Result<Option<R>, StoreError> {
        let data = self.data.lock().await;
        match data.provider_id_index.get(id) {
            Some(business_id) => Ok(data.by_business_id.get(business_id).cloned()),
            None => Ok(None),
        }
    }
}

/// The payment store: upsert keyed by `business_payment_id`, secondary
/// lookup by `payment_intent_id`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn save(&self, record: PaymentRecord) -> Result<(), StoreError>;
    async fn get_by_business_id(&self, id: &str) -> Result<Option<PaymentRecord>, StoreError>;
    async fn get_by_provider_id(&self, id: &str) -> Result<Option<PaymentRecord>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryPaymentStore(GenericRecordStore<PaymentRecord>);

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn save(&self, record: PaymentRecord) -> Result<(), StoreError> {
        record.assert_invariants();
        self.0.save(record).await
    }
    async fn get_by_business_id(&self, id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        self.0.get_by_business_id(id).await
    }
    async fn get_by_provider_id(&self, id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        self.0.get_by_provider_id(id).await
    }
}

/// The subscription store: upsert keyed by `business_subscription_id`,
/// secondary lookup by `subscription_id`.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn save(&self, record: SubscriptionRecord) -> Result<(), StoreError>;
    async fn get_by_business_id(&self, id: &str) -> Result<Option<SubscriptionRecord>, StoreError>;
    async fn get_by_provider_id(&self, id: &str) -> Result<Option<SubscriptionRecord>, StoreError>;
}

#[derive(Default)]
pub struct InMemorySubscriptionStore(GenericRecordStore<SubscriptionRecord>);

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn save(&self, record: SubscriptionRecord) -> Result<(), StoreError> {
        record.assert_invariants();
        self.0.save(record).await
    }
    async fn get_by_business_id(&self, id: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.0.get_by_business_id(id).await
    }
    async fn get_by_provider_id(&self, id: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.0.get_by_provider_id(id).await
    }
}

/// The refund store: upsert keyed by `business_refund_id`, secondary
/// lookup by `refund_id`.
#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn save(&self, record: RefundRecord) -> Result<(), StoreError>;
    async fn get_by_business_id(&self, id: &str) -> Result<Option<RefundRecord>, StoreError>;
    async fn get_by_provider_id(&self, id: &str) -> Result<Option<RefundRecord>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryRefundStore(GenericRecordStore<RefundRecord>);

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn save(&self, record: RefundRecord) -> Result<(), StoreError> {
        record.assert_invariants();
        self.0.save(record).await
    }
    async fn get_by_business_id(&self, id: &str) -> Result<Option<RefundRecord>, StoreError> {
        self.0.get_by_business_id(id).await
    }
    async fn get_by_provider_id(&self, id: &str) -> Result<Option<RefundRecord>, StoreError> {
        self.0.get_by_provider_id(id).await
    }
}

/// Shared ownership handle for a store, the shape `payhook-engine` expects
/// its store dependencies in.
pub type Shared<T> = Arc<T>;

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use payhook_core::record::PaymentStatus;

    #[tokio::test]
    async fn save_then_get_by_business_id() {
        let store = InMemoryPaymentStore::new();
        let record = PaymentRecord::new_pending("user_1", "biz_pay_1");
        store.save(record.clone()).await.unwrap();
        assert_eq!(store.get_by_business_id("biz_pay_1").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn provider_id_index_tracks_rewrites() {
        let store = InMemoryPaymentStore::new();
        let mut record = PaymentRecord::new_pending("user_1", "biz_pay_1");
        record.payment_intent_id = Some("pi_1".to_string());
        store.save(record.clone()).await.unwrap();
        assert_eq!(
            store.get_by_provider_id("pi_1").await.unwrap().map(|r| r.business_payment_id),
            Some("biz_pay_1".to_string())
        );

        record.payment_intent_id = Some("pi_2".to_string());
        record.status = PaymentStatus::Succeeded;
        store.save(record).await.unwrap();

        // The stale pi_1 -> biz_pay_1 mapping must be gone.
        assert_eq!(store.get_by_provider_id("pi_1").await.unwrap(), None);
        assert_eq!(
            store.get_by_provider_id("pi_2").await.unwrap().map(|r| r.status),
            Some(PaymentStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn missing_business_id_returns_none() {
        let store = InMemoryPaymentStore::new();
        assert_eq!(store.get_by_business_id("nonexistent").await.unwrap(), None);
    }

    /// After any sequence of saves, every provider-id index
    /// entry `pid -> bid` points at a record whose own provider id is
    /// `pid`, and every record with a non-null provider id has exactly one
    /// index entry pointing back at it. A small, overlapping alphabet of
    /// business/provider ids is used so saves actually exercise rewrites
    /// and reuse, not just fresh inserts.
    #[test]
    fn provider_id_index_stays_consistent_under_arbitrary_save_sequences() {
        let business_ids = (0..4usize).map(|i| format!("biz_{i}")).collect::<Vec<_>>();
        let provider_ids = (0..3usize).map(|i| format!("pi_{i}")).collect::<Vec<_>>();
        let op_strategy = (
            prop::sample::select(business_ids),
            prop::option::of(prop::sample::select(provider_ids)),
        );

        proptest!(|(ops in prop::collection::vec(op_strategy, 0..50))| {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryPaymentStore::new();
                for (business_id, provider_id) in &ops {
                    let mut record = PaymentRecord::new_pending("user_1", business_id);
                    record.payment_intent_id = provider_id.clone();
                    store.save(record).await.unwrap();
                }

                let mut expected_business_ids: Vec<&String> = ops.iter().map(|(b, _)| b).collect();
                expected_business_ids.sort();
                expected_business_ids.dedup();

                for business_id in expected_business_ids {
                    let record = store.get_by_business_id(business_id).await.unwrap().unwrap();
                    if let Some(provider_id) = &record.payment_intent_id {
                        let via_index = store.get_by_provider_id(provider_id).await.unwrap();
                        prop_assert_eq!(via_index.as_ref().map(|r| &r.business_payment_id), Some(business_id));
                    }
                }
                Ok(())
            })?;
        });
    }
}
