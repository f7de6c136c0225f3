// src/server/http/envelope.rs

//! The one place a `FleetError` becomes an HTTP response:
//! every handler returns `FleetResult<T>`, and this module is where `kind`
//! turns into a status code and `detail` gets attached without ever
//! touching the user-visible `message`.

use crate::core::errors::FleetError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { status: "success", message: message.into(), data: Some(data) }
    }
}

/// `ok(data)` with the body as `{status:"success", message:"ok", data}`.
pub fn ok<T: Serialize>(data: T) -> Json<ApiEnvelope<T>> {
    Json(ApiEnvelope::ok("ok", data))
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    status: &'static str,
    message: String,
    error: ErrorBody,
}

/// Maps `FleetError::kind()` to an HTTP status code.
fn status_for(err: &FleetError) -> StatusCode {
    match err {
        FleetError::Validation(_) => StatusCode::BAD_REQUEST,
        FleetError::NotFound(_) => StatusCode::NOT_FOUND,
        FleetError::AlreadyExists(_) => StatusCode::CONFLICT,
        FleetError::InvalidState(_) => StatusCode::CONFLICT,
        FleetError::ResourceBusy(_) => StatusCode::CONFLICT,
        FleetError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        FleetError::ClusterUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        FleetError::LeaderUnknown => StatusCode::SERVICE_UNAVAILABLE,
        FleetError::ForwardFailed { .. } => StatusCode::BAD_GATEWAY,
        FleetError::UpstreamFailed { .. } => StatusCode::BAD_GATEWAY,
        FleetError::TransferFailed { .. } => StatusCode::BAD_GATEWAY,
        FleetError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        FleetError::Cancelled => StatusCode::CONFLICT,
        FleetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FleetError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub struct ApiError(pub FleetError);

impl From<FleetError> for ApiError {
    fn from(e: FleetError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorEnvelope {
            status: "error",
            message: self.0.to_string(),
            error: ErrorBody { kind: self.0.kind(), detail: self.0.detail().map(str::to_string) },
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiEnvelope<T>>, ApiError>;

pub fn respond<T: Serialize>(result: crate::core::errors::FleetResult<T>) -> ApiResult<T> {
    Ok(ok(result.map_err(ApiError::from)?))
}
