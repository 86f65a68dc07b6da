//! Shared event-shape types produced by the parser and consumed by the
//! convergence engine. Event-type dispatch is modeled as a closed,
//! exhaustive-checkable tagged enum rather than a string switch.

use serde::{Deserialize, Serialize};

use crate::time::UnixTime;

/// The webhook event types the convergence engine has a dispatch rule
/// for. Any other wire `type` string parses to
/// [`EventType::Other`], which the engine treats as a silent no-op success.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    PaymentIntentSucceeded,
    PaymentIntentPaymentFailed,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    CustomerSubscriptionDeleted,
    CustomerSubscriptionCreated,
    CustomerSubscriptionUpdated,
    RefundCreated,
    RefundUpdated,
    RefundFailed,
    /// Any event type not in the dispatch table.
    Other,
}

impl EventType {
    /// Parses the wire `type` string (e.g. `"payment_intent.succeeded"`)
    /// into the closed [`EventType`] enum. Unrecognized strings map to
    /// [`EventType::Other`] rather than erroring: an unknown event type
    /// is an ignored no-op, not a parse failure.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentPaymentFailed,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "refund.created" => Self::RefundCreated,
            "refund.updated" => Self::RefundUpdated,
            "refund.failed" => Self::RefundFailed,
            _ => Self::Other,
        }
    }
}

/// The kind of provider object a webhook event's `data.object` represents.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    PaymentIntent,
    Invoice,
    Subscription,
    Refund,
    CheckoutSession,
    #[default]
    Unknown,
}

/// Linked provider ids extracted from `data.object`, used by the
/// convergence engine to resolve the target record.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LinkedIds {
    pub payment_intent_id: Option<String>,
    pub subscription_id: Option<String>,
    pub refund_id: Option<String>,
    pub customer_id: Option<String>,
}

/// Merchant business ids recovered from `client_reference_id` or
/// `metadata`, used to locate a record when no provider-id linkage exists
/// yet.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BusinessIds {
    pub business_payment_id: Option<String>,
    pub business_subscription_id: Option<String>,
}

/// A normalized view of a webhook event, produced by the parser from
/// either a raw body or an SDK-typed event object. This is the
/// sole input to the convergence engine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub id: String,
    pub event_type: EventType,
    /// The original wire `type` string, kept for logging/correlation even
    /// though dispatch uses [`ParsedEvent::event_type`].
    pub raw_type: String,
    pub created_at: Option<UnixTime>,
    pub object_id: Option<String>,
    pub object_kind: ObjectKind,
    pub object_status: Option<String>,
    pub linked_ids: LinkedIds,
    pub business_ids: BusinessIds,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_known_event_types() {
        assert_eq!(
            EventType::parse("payment_intent.succeeded"),
            EventType::PaymentIntentSucceeded
        );
        assert_eq!(
            EventType::parse("customer.subscription.deleted"),
            EventType::CustomerSubscriptionDeleted
        );
    }

    #[test]
    fn unknown_event_type_is_other() {
        assert_eq!(EventType::parse("charge.dispute.created"), EventType::Other);
        assert_eq!(EventType::parse(""), EventType::Other);
    }
}
