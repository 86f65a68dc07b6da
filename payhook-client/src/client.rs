//! The provider HTTP client itself, modeled on the thin `RestClient`
//! wrapper pattern: a tagged user agent, one request timeout, and uniform
//! JSON (de)serialization, rather than a full-blown provider SDK.

use std::time::Duration;

use async_trait::async_trait;
use payhook_core::error::StoreError;
use payhook_core::provider::{EventListParams, EventPage};
use payhook_store::events::EventSource;
use payhook_store::lookup::ObjectLookup;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A conservative ceiling on a single request, since this client is only
/// ever used for read-only lookups and reconciliation paging, never on the
/// hot ingest path.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The event types the convergence engine's dispatch table has a rule for; the
/// only ones worth asking the provider's event-list API to filter on
/// during reconciliation.
pub const SUPPORTED_EVENT_TYPES: &[&str] = &[
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "invoice.payment_succeeded",
    "invoice.payment_failed",
    "customer.subscription.deleted",
    "customer.subscription.created",
    "customer.subscription.updated",
    "refund.created",
    "refund.updated",
    "refund.failed",
];

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to provider failed: {0}")]
    Request(String),
    #[error("could not decode provider response: {0}")]
    Decode(String),
}

impl From<ProviderError> for StoreError {
    fn from(err: ProviderError) -> Self {
        StoreError::unavailable(err)
    }
}

#[derive(Clone, Serialize)]
struct ListEventsQuery<'a> {
    #[serde(rename = "type[]")]
    types: &'a [&'a str],
    limit: u32,
    created: CreatedFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    starting_after: Option<&'a str>,
}

#[derive(Clone, Serialize)]
struct CreatedFilter {
    gte: i64,
}

#[derive(Deserialize)]
struct EventListResponse {
    data: Vec<Value>,
    has_more: bool,
}

/// A read-only client against the provider's REST API: invoice/event
/// lookups for the thin-event fallback, and paginated event listing for
/// the reconciliation pass.
#[derive(Clone)]
pub struct HttpProviderClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProviderClient {
    /// `base_url` should not have a trailing slash, e.g.
    /// `https://api.stripe.com/v1`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("payhook-client/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest client");
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    pub async fn get_invoice(&self, id: &str) -> Result<Value, ProviderError> {
        self.get_json(&format!("/invoices/{id}")).await
    }

    pub async fn get_event(&self, id: &str) -> Result<Value, ProviderError> {
        self.get_json(&format!("/events/{id}")).await
    }

    /// The reconciler's pagination contract: feeds `params` straight through to the
    /// provider's `type[]`/`created[gte]`/`starting_after` query params.
    pub async fn list_events(&self, params: &EventListParams) -> Result<EventPage, ProviderError> {
        let query = ListEventsQuery {
            types: SUPPORTED_EVENT_TYPES,
            limit: params.limit,
            created: CreatedFilter {
                gte: params.created_after.as_i64(),
            },
            starting_after: params.starting_after_event_id.as_deref(),
        };
        let url = format!("{}/events", self.base_url);
        let response: EventListResponse = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProviderError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let last_event_id = response
            .data
            .last()
            .and_then(|event| event.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(EventPage {
            events: response.data,
            has_more: response.has_more,
            last_event_id,
        })
    }
}

/// Feeds the reconciliation pass: delegates to the inherent
/// [`HttpProviderClient::list_events`], converting [`ProviderError`] into the
/// store-facing [`StoreError`] the reconciler is written against.
#[async_trait]
impl EventSource for HttpProviderClient {
    async fn list_events(&self, params: &EventListParams) -> Result<EventPage, StoreError> {
        Ok(self.list_events(params).await?)
    }
}

/// Prefix-dispatched object lookup: `pi_`/`sub_` ids are
/// already the linkage; `in_` invoices and `evt_` events require a
/// follow-up fetch and an inspection of the embedded object.
#[async_trait]
impl ObjectLookup for HttpProviderClient {
    async fn get_payment_intent_id(&self, object_id: &str) -> Result<Option<String>, StoreError> {
        if let Some(id) = as_is_if_prefixed(object_id, "pi_") {
            return Ok(Some(id));
        }
        if object_id.starts_with("in_") {
            let invoice = self.get_invoice(object_id).await?;
            return Ok(string_field(&invoice, "payment_intent"));
        }
        if object_id.starts_with("evt_") {
            let event = self.get_event(object_id).await?;
            return Ok(embedded_payment_intent_id(&event));
        }
        Ok(None)
    }

    async fn get_subscription_id(&self, object_id: &str) -> Result<Option<String>, StoreError> {
        if let Some(id) = as_is_if_prefixed(object_id, "sub_") {
            return Ok(Some(id));
        }
        if object_id.starts_with("in_") {
            let invoice = self.get_invoice(object_id).await?;
            return Ok(string_field(&invoice, "subscription"));
        }
        if object_id.starts_with("evt_") {
            let event = self.get_event(object_id).await?;
            return Ok(embedded_subscription_id(&event));
        }
        Ok(None)
    }
}

fn as_is_if_prefixed(object_id: &str, prefix: &str) -> Option<String> {
    object_id.starts_with(prefix).then(|| object_id.to_string())
}

fn string_field(object: &Value, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_string)
}

fn embedded_payment_intent_id(event: &Value) -> Option<String> {
    let object = event.pointer("/data/object")?;
    match object.get("object").and_then(Value::as_str) {
        Some("payment_intent") => object.get("id").and_then(Value::as_str).map(str::to_string),
        _ => string_field(object, "payment_intent"),
    }
}

fn embedded_subscription_id(event: &Value) -> Option<String> {
    let object = event.pointer("/data/object")?;
    match object.get("object").and_then(Value::as_str) {
        Some("subscription") => object.get("id").and_then(Value::as_str).map(str::to_string),
        _ => string_field(object, "subscription"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_payment_intent_from_invoice_event() {
        let event = json!({
            "id": "evt_1",
            "data": {"object": {"object": "invoice", "payment_intent": "pi_9"}},
        });
        assert_eq!(embedded_payment_intent_id(&event), Some("pi_9".to_string()));
    }

    #[test]
    fn embedded_subscription_from_subscription_event() {
        let event = json!({
            "id": "evt_2",
            "data": {"object": {"object": "subscription", "id": "sub_9"}},
        });
        assert_eq!(embedded_subscription_id(&event), Some("sub_9".to_string()));
    }

    #[test]
    fn as_is_dispatch_for_already_resolved_ids() {
        assert_eq!(as_is_if_prefixed("pi_123", "pi_"), Some("pi_123".to_string()));
        assert_eq!(as_is_if_prefixed("in_123", "pi_"), None);
    }
}
