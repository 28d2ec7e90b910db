//! Uniform HTTP error type, following the pattern of
//! `packages/api/src/error.rs` `ApiError` (status + message, `IntoResponse`
//! impl, `From` bridges from domain errors) but mapped onto
//! `conflux_types::Error`'s categories instead of ad-hoc
//! constructors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        tracing::error!("internal error: {}", msg.into());
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// `conflux_types::Error` carries a behavioral taxonomy, not an
/// HTTP status, so every variant maps explicitly here rather than through a
/// blanket "internal error" fallback.
impl From<conflux_types::Error> for ApiError {
    fn from(err: conflux_types::Error) -> Self {
        let status = match &err {
            conflux_types::Error::Config(_) => StatusCode::BAD_REQUEST,
            conflux_types::Error::Routing(_) => StatusCode::NOT_FOUND,
            conflux_types::Error::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            conflux_types::Error::Execution(_) => StatusCode::UNPROCESSABLE_ENTITY,
            conflux_types::Error::PlannerRetryable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            conflux_types::Error::DataShape(_) => StatusCode::BAD_GATEWAY,
            conflux_types::Error::Consistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            conflux_types::Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(category = err.category(), "request failed: {}", err);
        Self::new(status, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("invalid json: {err}"))
    }
}
