//! Resolves a missing linked id from a raw object id by asking the
//! provider, for thin events that carry only an object id and no embedded
//! linkage. Kept as a trait separate from the record stores; `payhook-client`
//! implements it against the real provider, tests use an in-memory stub.

use async_trait::async_trait;
use payhook_core::error::StoreError;

/// Prefix-dispatched provider object resolution: `pi_`/`sub_`
/// ids are already the linkage; `in_` invoices and `evt_` events require a
/// follow-up fetch.
#[async_trait]
pub trait ObjectLookup: Send + Sync {
    async fn get_payment_intent_id(&self, object_id: &str) -> Result<Option<String>, StoreError>;
    async fn get_subscription_id(&self, object_id: &str) -> Result<Option<String>, StoreError>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod stub {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// An in-memory stub for tests that don't need real provider I/O:
    /// pre-seed `object_id -> linked_id` pairs and look them up directly,
    /// without prefix dispatch (that logic lives in `payhook-client`,
    /// which actually talks to the provider).
    #[derive(Default)]
    pub struct StubObjectLookup {
        payment_intents: Mutex<HashMap<String, String>>,
        subscriptions: Mutex<HashMap<String, String>>,
    }

    impl StubObjectLookup {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_payment_intent(&self, object_id: impl Into<String>, payment_intent_id: impl Into<String>) {
            self.payment_intents
                .lock()
                .unwrap()
                .insert(object_id.into(), payment_intent_id.into());
        }

        pub fn seed_subscription(&self, object_id: impl Into<String>, subscription_id: impl Into<String>) {
            self.subscriptions
                .lock()
                .unwrap()
                .insert(object_id.into(), subscription_id.into());
        }
    }

    #[async_trait]
    impl ObjectLookup for StubObjectLookup {
        async fn get_payment_intent_id(&self, object_id: &str) -> Result<Option<String>, StoreError> {
            Ok(self.payment_intents.lock().unwrap().get(object_id).cloned())
        }

        async fn get_subscription_id(&self, object_id: &str) -> Result<Option<String>, StoreError> {
            Ok(self.subscriptions.lock().unwrap().get(object_id).cloned())
        }
    }
}
