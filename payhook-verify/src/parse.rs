//! Normalizes a webhook event — raw body or provider-SDK event object —
//! into a [`ParsedEvent`], the sole input the convergence engine ever
//! sees.

use payhook_core::event::{BusinessIds, EventType, LinkedIds, ObjectKind, ParsedEvent};
use payhook_core::time::UnixTime;
use serde_json::Value;

use crate::VerifyError;

/// Parses a raw webhook body (the same bytes the signature check verified)
/// into a [`ParsedEvent`].
pub fn parse_from_raw_body(raw_body: &[u8]) -> Result<ParsedEvent, VerifyError> {
    let envelope: Value =
        serde_json::from_slice(raw_body).map_err(|_| VerifyError::MalformedPayload)?;
    parse_from_envelope(&envelope)
}

/// Parses an already-deserialized event envelope — either the raw webhook
/// body decoded to [`Value`], or a provider-SDK typed event object
/// re-serialized to the same shape.
pub fn parse_from_envelope(envelope: &Value) -> Result<ParsedEvent, VerifyError> {
    let id = envelope
        .get("id")
        .and_then(Value::as_str)
        .ok_or(VerifyError::MalformedPayload)?
        .to_string();
    let raw_type = envelope
        .get("type")
        .and_then(Value::as_str)
        .ok_or(VerifyError::MalformedPayload)?
        .to_string();
    let created_at = envelope
        .get("created")
        .and_then(Value::as_i64)
        .map(UnixTime::from_secs);

    let object = envelope.pointer("/data/object");
    let (object_kind, object_id, object_status, linked_ids, business_ids) = match object {
        Some(object) => parse_object(object),
        None => Default::default(),
    };

    Ok(ParsedEvent {
        id,
        event_type: EventType::parse(&raw_type),
        raw_type,
        created_at,
        object_id,
        object_kind,
        object_status,
        linked_ids,
        business_ids,
    })
}

type ObjectFields = (
    ObjectKind,
    Option<String>,
    Option<String>,
    LinkedIds,
    BusinessIds,
);

/// Walks `data.object`, producing every field [`ParsedEvent`] needs (spec
/// §4.3).
fn parse_object(object: &Value) -> ObjectFields {
    let object_kind = object
        .get("object")
        .and_then(Value::as_str)
        .map(object_kind_of)
        .unwrap_or(ObjectKind::Unknown);
    let object_id = object.get("id").and_then(Value::as_str).map(str::to_string);
    let object_status = object
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_string);

    let metadata_str = |field: &str| -> Option<String> {
        object
            .pointer(&format!("/metadata/{field}"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let field_str = |field: &str| -> Option<String> {
        object.get(field).and_then(Value::as_str).map(str::to_string)
    };

    let mut linked_ids = LinkedIds {
        customer_id: field_str("customer"),
        ..Default::default()
    };
    let mut business_ids = BusinessIds::default();

    match object_kind {
        ObjectKind::PaymentIntent => {
            linked_ids.payment_intent_id = object_id.clone();
            business_ids.business_payment_id = metadata_str("business_payment_id");
        }
        ObjectKind::Invoice => {
            linked_ids.payment_intent_id = field_str("payment_intent");
            linked_ids.subscription_id = field_str("subscription");
            business_ids.business_payment_id = metadata_str("business_payment_id");
            business_ids.business_subscription_id = metadata_str("business_subscription_id");
        }
        ObjectKind::Subscription => {
            linked_ids.subscription_id = object_id.clone();
            business_ids.business_subscription_id = metadata_str("business_subscription_id");
        }
        ObjectKind::Refund => {
            // Refund id falls back to `data.object.id`.
            linked_ids.refund_id = field_str("id").or_else(|| object_id.clone());
            linked_ids.payment_intent_id = field_str("payment_intent");
            business_ids.business_payment_id = metadata_str("business_payment_id");
        }
        ObjectKind::CheckoutSession => {
            let client_reference_id = field_str("client_reference_id");
            match field_str("mode").as_deref() {
                Some("payment") => {
                    business_ids.business_payment_id =
                        client_reference_id.or_else(|| metadata_str("business_payment_id"));
                }
                Some("subscription") => {
                    business_ids.business_subscription_id =
                        client_reference_id.or_else(|| metadata_str("business_subscription_id"));
                }
                _ => {}
            }
            linked_ids.payment_intent_id = field_str("payment_intent");
            linked_ids.subscription_id = field_str("subscription");
        }
        ObjectKind::Unknown => {
            business_ids.business_payment_id = metadata_str("business_payment_id");
            business_ids.business_subscription_id = metadata_str("business_subscription_id");
        }
    }

    (object_kind, object_id, object_status, linked_ids, business_ids)
}

fn object_kind_of(raw: &str) -> ObjectKind {
    match raw {
        "payment_intent" => ObjectKind::PaymentIntent,
        "invoice" => ObjectKind::Invoice,
        "subscription" => ObjectKind::Subscription,
        "refund" => ObjectKind::Refund,
        "checkout.session" => ObjectKind::CheckoutSession,
        _ => ObjectKind::Unknown,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use payhook_core::event::EventType;
    use serde_json::json;

    #[test]
    fn parses_payment_intent_succeeded() {
        let body = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "created": 1700000000,
            "data": {"object": {"object": "payment_intent", "id": "pi_1", "status": "succeeded"}},
        })
        .to_string();

        let parsed = parse_from_raw_body(body.as_bytes()).unwrap();
        assert_eq!(parsed.event_type, EventType::PaymentIntentSucceeded);
        assert_eq!(parsed.object_kind, ObjectKind::PaymentIntent);
        assert_eq!(parsed.linked_ids.payment_intent_id, Some("pi_1".to_string()));
        assert_eq!(parsed.object_status, Some("succeeded".to_string()));
    }

    #[test]
    fn thin_invoice_event_has_no_direct_subscription_link() {
        let body = json!({
            "id": "evt_2",
            "type": "invoice.payment_succeeded",
            "created": 1700000000,
            "data": {"object": {"object": "invoice", "id": "in_x"}},
        })
        .to_string();

        let parsed = parse_from_raw_body(body.as_bytes()).unwrap();
        assert_eq!(parsed.object_id, Some("in_x".to_string()));
        assert_eq!(parsed.linked_ids.subscription_id, None);
    }

    #[test]
    fn checkout_session_payment_mode_resolves_business_id_from_client_reference() {
        let body = json!({
            "id": "evt_3",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "object": "checkout.session",
                    "mode": "payment",
                    "client_reference_id": "biz_pay_1",
                    "payment_intent": "pi_5",
                },
            },
        })
        .to_string();

        let parsed = parse_from_raw_body(body.as_bytes()).unwrap();
        assert_eq!(
            parsed.business_ids.business_payment_id,
            Some("biz_pay_1".to_string())
        );
        assert_eq!(parsed.linked_ids.payment_intent_id, Some("pi_5".to_string()));
    }

    #[test]
    fn checkout_session_falls_back_to_metadata_when_no_client_reference() {
        let body = json!({
            "id": "evt_4",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "object": "checkout.session",
                    "mode": "subscription",
                    "metadata": {"business_subscription_id": "biz_sub_1"},
                },
            },
        })
        .to_string();

        let parsed = parse_from_raw_body(body.as_bytes()).unwrap();
        assert_eq!(
            parsed.business_ids.business_subscription_id,
            Some("biz_sub_1".to_string())
        );
    }

    #[test]
    fn business_id_recovered_from_metadata_on_payment_intent() {
        let body = json!({
            "id": "evt_5",
            "type": "payment_intent.succeeded",
            "created": 1700000000,
            "data": {
                "object": {
                    "object": "payment_intent",
                    "id": "pi_new",
                    "metadata": {"business_payment_id": "biz_pay_1"},
                },
            },
        })
        .to_string();

        let parsed = parse_from_raw_body(body.as_bytes()).unwrap();
        assert_eq!(
            parsed.business_ids.business_payment_id,
            Some("biz_pay_1".to_string())
        );
        assert_eq!(parsed.linked_ids.payment_intent_id, Some("pi_new".to_string()));
    }

    #[test]
    fn refund_id_falls_back_to_object_id() {
        let body = json!({
            "id": "evt_6",
            "type": "refund.created",
            "data": {"object": {"object": "refund", "id": "re_1", "status": "pending"}},
        })
        .to_string();

        let parsed = parse_from_raw_body(body.as_bytes()).unwrap();
        assert_eq!(parsed.linked_ids.refund_id, Some("re_1".to_string()));
    }

    #[test]
    fn missing_required_top_level_field_is_malformed() {
        let body = json!({"type": "payment_intent.succeeded"}).to_string();
        assert!(parse_from_raw_body(body.as_bytes()).is_err());
    }

    #[test]
    fn event_with_no_data_object_parses_with_defaults() {
        let body = json!({"id": "evt_7", "type": "some.unhandled.event"}).to_string();
        let parsed = parse_from_raw_body(body.as_bytes()).unwrap();
        assert_eq!(parsed.event_type, EventType::Other);
        assert_eq!(parsed.object_kind, ObjectKind::Unknown);
    }
}
