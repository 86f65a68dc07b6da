//! The refund-creator collaborator: stages a `Pending` [`RefundRecord`]
//! ahead of the actual provider refund call, guarded by ownership/eligibility
//! checks against the target [`PaymentRecord`]. It is the one write path
//! into the record stores that isn't driven by an inbound webhook event.

use payhook_core::record::{PaymentStatus, RefundRecord};
use payhook_store::records::{PaymentStore, RefundStore};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum RefundRequestError {
    #[error("no payment record found for business_payment_id")]
    PaymentNotFound,
    #[error("payment record is not owned by the requesting user")]
    PaymentNotOwned,
    #[error("payment is not eligible for refund: must be Succeeded with a payment_intent_id")]
    PaymentNotEligible,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<payhook_core::error::StoreError> for RefundRequestError {
    fn from(err: payhook_core::error::StoreError) -> Self {
        match err {
            payhook_core::error::StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

/// Stages a refund request. Idempotent on `business_refund_id`: a repeat
/// call with the same id returns the already-staged (or since-converged)
/// record rather than clobbering it back to `Pending`.
#[instrument(skip_all, fields(user_id, business_refund_id, business_payment_id))]
pub async fn create_refund_request<Pay, Ref>(
    payments: &Pay,
    refunds: &Ref,
    user_id: &str,
    business_refund_id: &str,
    business_payment_id: &str,
) -> Result<RefundRecord, RefundRequestError>
where
    Pay: PaymentStore,
    Ref: RefundStore,
{
    if let Some(existing) = refunds.get_by_business_id(business_refund_id).await? {
        return Ok(existing);
    }

    let payment = payments
        .get_by_business_id(business_payment_id)
        .await?
        .ok_or(RefundRequestError::PaymentNotFound)?;
    if payment.user_id != user_id {
        return Err(RefundRequestError::PaymentNotOwned);
    }
    if payment.status != PaymentStatus::Succeeded || payment.payment_intent_id.is_none() {
        return Err(RefundRequestError::PaymentNotEligible);
    }

    let mut record = RefundRecord::new_pending(user_id, business_refund_id, business_payment_id);
    record.payment_intent_id = payment.payment_intent_id;
    refunds.save(record.clone()).await?;
    Ok(record)
}
