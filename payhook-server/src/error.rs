//! The one canonical error response shape this server returns: every
//! error body is a serde-derived struct, never a raw `Value`.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiError {
    status: &'static str,
    error: String,
    #[serde(skip)]
    code: StatusCode,
}

impl ApiError {
    /// A request that failed for a client-caused reason (400).
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            status: "failed",
            error: error.to_string(),
            code: StatusCode::BAD_REQUEST,
        }
    }

    /// A dependency (a store or the provider) was unavailable (503).
    pub fn unavailable(error: impl std::fmt::Display) -> Self {
        Self {
            status: "failed",
            error: error.to_string(),
            code: StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code;
        (code, Json(self)).into_response()
    }
}
