//! Deterministic, bounded-length idempotency keys from `(scope,
//! business_id)`, used to tag outbound provider requests (checkout session
//! creation, refund creation) so that client-side retries never create a
//! second provider-side object for the same business operation.

use ring::digest;
use thiserror::Error;

use crate::hex;

/// The maximum length, in bytes, of a key returned by [`create`]. Chosen to
/// stay under the idempotency-key length limits imposed by payment provider
/// APIs (Stripe's limit is 255 bytes).
pub const MAX_KEY_LEN: usize = 255;

/// A rendered digest is always `SHA256_HEX_LEN` hex chars (32 bytes -> 64
/// hex digits), regardless of the input's length.
const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum IdempotencyError {
    #[error("idempotency scope must not be empty")]
    EmptyScope,
    #[error("business id must not be empty")]
    EmptyBusinessId,
}

/// Builds a deterministic idempotency key for `(scope, business_id)`.
///
/// - If `scope ":" business_id` fits within [`MAX_KEY_LEN`] bytes, that
///   literal concatenation is returned.
/// - Otherwise, `business_id` is collapsed to its SHA-256 hex digest, and
///   `scope` is truncated (at a `char` boundary) just enough that
///   `scope' ":" hex(sha256(business_id))` still fits in [`MAX_KEY_LEN`]
///   bytes.
///
/// Distinct `business_id`s collide only with the (cryptographically
/// negligible) probability of a SHA-256 collision; identical inputs always
/// produce identical keys.
pub fn create(scope: &str, business_id: &str) -> Result<String, IdempotencyError> {
    if scope.is_empty() {
        return Err(IdempotencyError::EmptyScope);
    }
    if business_id.is_empty() {
        return Err(IdempotencyError::EmptyBusinessId);
    }

    let literal_len = scope.len() + 1 + business_id.len();
    if literal_len <= MAX_KEY_LEN {
        let mut key = String::with_capacity(literal_len);
        key.push_str(scope);
        key.push(':');
        key.push_str(business_id);
        return Ok(key);
    }

    let digest_hex = hex::encode(digest::digest(&digest::SHA256, business_id.as_bytes()).as_ref());
    debug_assert_eq!(digest_hex.len(), SHA256_HEX_LEN);

    // Budget for the scope: total - 1 (colon) - digest length.
    let scope_budget = MAX_KEY_LEN.saturating_sub(1 + SHA256_HEX_LEN);
    let truncated_scope = truncate_at_char_boundary(scope, scope_budget);

    let mut key = String::with_capacity(truncated_scope.len() + 1 + digest_hex.len());
    key.push_str(truncated_scope);
    key.push(':');
    key.push_str(&digest_hex);
    Ok(key)
}

/// Truncates `s` to at most `max_len` bytes, backing off to the nearest
/// preceding `char` boundary so the result is always valid UTF-8.
fn truncate_at_char_boundary(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
