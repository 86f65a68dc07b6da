//! `POST /refunds`: the refund-creator collaborator's HTTP
//! surface. Stages a `Pending` `RefundRecord` ahead of the actual provider
//! refund call; the event-driven engine converges its eventual status.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use http::StatusCode;
use payhook_core::idempotency;
use payhook_engine::{create_refund_request, RefundRequestError};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn, Span};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub user_id: String,
    pub business_refund_id: String,
    pub business_payment_id: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub refund_id: Option<String>,
    pub status: payhook_core::record::RefundStatus,
}

#[instrument(
    skip_all,
    fields(user_id = %req.user_id, business_refund_id = %req.business_refund_id, idempotency_key = tracing::field::Empty)
)]
pub async fn create_refund(State(state): State<AppState>, Json(req): Json<RefundRequest>) -> Response {
    // The caller-supplied idempotency_key is for its own outbound provider
    // call; this collaborator's own idempotency is keyed off
    // `business_refund_id` (see `create_refund_request`'s dedupe-on-replay
    // behavior). Derive the C1 key so it's recorded as a correlation field
    // even when the caller didn't supply one.
    let derived_key = req
        .idempotency_key
        .clone()
        .unwrap_or_else(|| idempotency::create("refund", &req.business_refund_id).unwrap_or_default());
    Span::current().record("idempotency_key", &derived_key.as_str());

    let result = create_refund_request(
        &state.engine.payments,
        &state.engine.refunds,
        &req.user_id,
        &req.business_refund_id,
        &req.business_payment_id,
    )
    .await;

    match result {
        Ok(record) => {
            info!(status = ?record.status, "refund request staged");
            (
                StatusCode::OK,
                Json(RefundResponse {
                    refund_id: record.refund_id,
                    status: record.status,
                }),
            )
                .into_response()
        }
        Err(err @ RefundRequestError::PaymentNotFound) => {
            warn!(error = %err, "refund rejected");
            (StatusCode::NOT_FOUND, Json(ApiError::failed(err))).into_response()
        }
        Err(err @ (RefundRequestError::PaymentNotOwned | RefundRequestError::PaymentNotEligible)) => {
            warn!(error = %err, "refund rejected");
            (StatusCode::CONFLICT, Json(ApiError::failed(err))).into_response()
        }
        Err(err @ RefundRequestError::StoreUnavailable(_)) => {
            warn!(error = %err, "refund store unavailable");
            ApiError::unavailable(err).into_response()
        }
    }
}
