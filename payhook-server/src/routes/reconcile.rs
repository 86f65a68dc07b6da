//! `POST /reconcile`: runs one page of the reconciler against the wired
//! provider client and reports the `ReconciliationResult` shape.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use http::StatusCode;
use payhook_core::time::UnixTime;
use payhook_engine::reconcile;
use serde::Deserialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub limit: Option<u32>,
    pub created_after: Option<i64>,
    pub starting_after_event_id: Option<String>,
}

#[instrument(skip_all)]
pub async fn reconcile_endpoint(
    State(state): State<AppState>,
    Json(req): Json<ReconcileRequest>,
) -> Response {
    let config = state.engine.config();
    let limit = req.limit.unwrap_or(config.reconcile_default_limit);
    let now = UnixTime::now();
    let created_after = req
        .created_after
        .map(UnixTime::from_secs)
        .unwrap_or_else(|| config.reconcile_default_created_after(now));

    let result = reconcile(
        &state.engine,
        &state.dedupe,
        &state.provider,
        limit,
        created_after,
        req.starting_after_event_id,
        now,
        &state.shutdown,
    )
    .await;

    match result {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => ApiError::unavailable(err).into_response(),
    }
}
