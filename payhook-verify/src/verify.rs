//! Raw-body HMAC-SHA256 signature verification with timestamp
//! tolerance, and extraction of the canonical event header (`id`, `type`,
//! `created`).

use std::time::Duration;

use payhook_core::{hex, time::UnixTime};
use ring::hmac;
use serde::Deserialize;
use thiserror::Error;

/// The default tolerance on `|now - t|` before a signature is rejected as
/// stale, regardless of whether it verifies.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

#[derive(Debug, Error, Eq, PartialEq)]
pub enum VerifyError {
    #[error("signature header is missing a `t` or `v1` field")]
    SignatureMalformed,
    #[error("signature timestamp is outside the tolerance window")]
    SignatureTimestampOutsideTolerance,
    #[error("signature does not match any provided v1 entry")]
    SignatureMismatch,
    #[error("payload is missing a required field or is not valid JSON")]
    MalformedPayload,
}

/// The canonical header extracted from a verified event body: top-level
/// `id` and `type` are required; `created` is optional.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifiedEventHeader {
    pub id: String,
    pub event_type: String,
    pub created_at: Option<UnixTime>,
}

/// Only the three top-level fields the verifier reads out of the payload;
/// the rest is left to the event parser.
#[derive(Deserialize)]
struct EventHeaderPayload {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: Option<i64>,
}

struct SignatureHeader {
    t: i64,
    v1_entries: Vec<String>,
}

/// Parses `"t=<unix_seconds>,v1=<hex>(,v1=<hex>)*"`. Entries are
/// comma-separated `key=value` pairs; unrecognized keys are ignored (the
/// provider may add fields this verifier doesn't need).
fn parse_signature_header(header: &str) -> Result<SignatureHeader, VerifyError> {
    let mut t: Option<i64> = None;
    let mut v1_entries = Vec::new();

    for entry in header.split(',') {
        let mut parts = entry.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        match key {
            "t" => t = value.parse::<i64>().ok(),
            "v1" => v1_entries.push(value.to_string()),
            _ => {}
        }
    }

    let t = t.ok_or(VerifyError::SignatureMalformed)?;
    if v1_entries.is_empty() {
        return Err(VerifyError::SignatureMalformed);
    }
    Ok(SignatureHeader { t, v1_entries })
}

/// Verifies `raw_body` against `signature_header` under `secret`.
/// `now` and `tolerance` are passed in explicitly rather than read
/// from the system clock, so the tolerance check is deterministically
/// testable.
pub fn verify(
    raw_body: &[u8],
    signature_header: &str,
    secret: &[u8],
    now: UnixTime,
    tolerance: Duration,
) -> Result<VerifiedEventHeader, VerifyError> {
    let header = parse_signature_header(signature_header)?;

    let t = UnixTime::from_secs(header.t);
    let skew = if t > now {
        t.saturating_duration_since(now)
    } else {
        now.saturating_duration_since(t)
    };
    if skew > tolerance {
        return Err(VerifyError::SignatureTimestampOutsideTolerance);
    }

    let signed_payload = signed_payload(header.t, raw_body);
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let matches = header.v1_entries.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|tag| hmac::verify(&key, &signed_payload, &tag).is_ok())
            .unwrap_or(false)
    });
    if !matches {
        return Err(VerifyError::SignatureMismatch);
    }

    let payload: EventHeaderPayload =
        serde_json::from_slice(raw_body).map_err(|_| VerifyError::MalformedPayload)?;
    if payload.id.is_empty() || payload.event_type.is_empty() {
        return Err(VerifyError::MalformedPayload);
    }

    Ok(VerifiedEventHeader {
        id: payload.id,
        event_type: payload.event_type,
        created_at: payload.created.map(UnixTime::from_secs),
    })
}

/// Builds the `t + "." + raw_body` signed payload.
fn signed_payload(t: i64, raw_body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(raw_body.len() + 24);
    buf.extend_from_slice(t.to_string().as_bytes());
    buf.push(b'.');
    buf.extend_from_slice(raw_body);
    buf
}
