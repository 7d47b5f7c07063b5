pub mod auth;
pub mod health;
pub mod jwks;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::auth::Status;

const INTERNAL_ERROR: &str = "Internal server error.";

pub(crate) const fn status_code(status: Status) -> StatusCode {
    match status {
        Status::Ok => StatusCode::OK,
        Status::Rejected => StatusCode::FORBIDDEN,
        Status::NotFound => StatusCode::NOT_FOUND,
    }
}

/// Faults are logged in full and answered with a generic 500.
pub(crate) fn fault_response(operation: &str, err: &anyhow::Error) -> Response {
    error!("{operation} failed: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            "message": INTERNAL_ERROR,
        })),
    )
        .into_response()
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
