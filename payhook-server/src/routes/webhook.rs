//! `POST /webhooks/stripe`. Raw-body capture via [`axum::body::Bytes`],
//! never `Json<...>`, so the byte-exact body reaches signature verification
//! untouched.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use http::{HeaderMap, StatusCode};
use payhook_core::time::UnixTime;
use payhook_engine::{ingest, IngestError, IngestOutcome};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum WebhookResponse {
    Ok,
    Duplicate,
    Failed { error: String },
    Retry { error: Option<String> },
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        let code = match &self {
            Self::Ok | Self::Duplicate => StatusCode::OK,
            Self::Failed { .. } => StatusCode::BAD_REQUEST,
            Self::Retry { .. } => StatusCode::CONFLICT,
        };
        (code, Json(self)).into_response()
    }
}

#[instrument(skip_all)]
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> WebhookResponse {
    let signature_header = match headers.get("stripe-signature").and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => {
            warn!("missing Stripe-Signature header");
            return WebhookResponse::Failed {
                error: "missing Stripe-Signature header".to_string(),
            };
        }
    };

    let now = UnixTime::now();
    let outcome = ingest(
        &state.engine,
        &state.dedupe,
        &body,
        signature_header,
        &state.webhook_secret,
        now,
    )
    .await;

    match outcome {
        Ok(IngestOutcome::Processed {
            event_id,
            succeeded: true,
            ..
        }) => {
            info!(event_id, "webhook delivery processed");
            WebhookResponse::Ok
        }
        Ok(IngestOutcome::Processed {
            event_id,
            succeeded: false,
            error_message,
        }) => {
            warn!(event_id, error = ?error_message, "webhook delivery applied but failed, caller should retry");
            WebhookResponse::Retry { error: error_message }
        }
        Ok(IngestOutcome::Duplicate { event_id, .. }) => {
            info!(event_id, "webhook delivery is a terminal duplicate");
            WebhookResponse::Duplicate
        }
        Ok(IngestOutcome::NonTerminalDuplicate { event_id, .. }) => {
            info!(event_id, "webhook delivery raced an in-flight or unclaimed attempt, caller should retry");
            WebhookResponse::Retry { error: None }
        }
        Err(IngestError::Verify(err)) => {
            warn!(error = %err, "webhook signature/parse verification failed");
            WebhookResponse::Failed { error: err.to_string() }
        }
        Err(IngestError::Store(err)) => {
            warn!(error = %err, "dedupe store unavailable before processing could begin");
            WebhookResponse::Retry {
                error: Some(err.to_string()),
            }
        }
    }
}
