use crate::auth::Jwks;
use axum::{extract::Extension, response::Json};
use std::sync::Arc;

/// Public keys relying parties verify tokens with.
pub async fn jwks(jwks: Extension<Arc<Jwks>>) -> Json<Jwks> {
    Json(jwks.0.as_ref().clone())
}
