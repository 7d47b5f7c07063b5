//! Token endpoints. Thin mapping from HTTP to the authenticator flows.
//!
//! The refresh endpoint always runs the stamp check; skipping it is only
//! available to in-process callers of `Authenticator::refresh`.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{extract_bearer_token, fault_response, status_code};
use crate::auth::{
    AuthResult, Authenticator, Claim, Credentials, Identifiers, Principal, ValidationResult,
};

const MISSING_BEARER: &str = "Missing bearer token.";

#[derive(Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    secret: String,
}

impl TokenRequest {
    fn into_credentials(self) -> Credentials {
        Credentials::new(
            Identifiers {
                id: self.id,
                username: self.username,
                email: self.email,
            },
            SecretString::from(self.secret),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&AuthResult> for AuthResponse {
    fn from(result: &AuthResult) -> Self {
        Self {
            status: result.status().code(),
            token: result.token().map(str::to_string),
            expires_at: result.expires_at(),
            message: result.message().map(str::to_string),
        }
    }
}

/// Public view of a principal; never carries the hash or the stamp.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrincipalView {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&Principal> for PrincipalView {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id.clone(),
            username: principal.username.clone(),
            email: principal.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Vec<Claim>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&ValidationResult> for ValidationResponse {
    fn from(result: &ValidationResult) -> Self {
        match result {
            ValidationResult::Valid(valid) => Self {
                status: result.status().code(),
                principal: Some(PrincipalView::from(&valid.principal)),
                claims: Some(valid.claims.as_slice().to_vec()),
                expires_at: Some(valid.expires_at),
                message: None,
            },
            ValidationResult::Rejected(rejection) => Self {
                status: result.status().code(),
                principal: None,
                claims: None,
                expires_at: None,
                message: Some(rejection.message.clone()),
            },
        }
    }
}

fn auth_response(result: &AuthResult) -> Response {
    (status_code(result.status()), Json(AuthResponse::from(result))).into_response()
}

fn missing_bearer() -> Response {
    debug!("Request without bearer token");
    (
        StatusCode::FORBIDDEN,
        Json(AuthResponse {
            status: StatusCode::FORBIDDEN.as_u16(),
            token: None,
            expires_at: None,
            message: Some(MISSING_BEARER.to_string()),
        }),
    )
        .into_response()
}

// axum handler for POST /v1/auth/token
pub async fn token(
    auth: Extension<Arc<Authenticator>>,
    Json(request): Json<TokenRequest>,
) -> Response {
    match auth.authenticate(&request.into_credentials()).await {
        Ok(result) => auth_response(&result),
        Err(err) => fault_response("authenticate", &err),
    }
}

// axum handler for POST /v1/auth/refresh
pub async fn refresh(auth: Extension<Arc<Authenticator>>, headers: HeaderMap) -> Response {
    let Some(token) = extract_bearer_token(&headers) else {
        return missing_bearer();
    };
    match auth.refresh(&token, false).await {
        Ok(result) => auth_response(&result),
        Err(err) => fault_response("refresh", &err),
    }
}

// axum handler for GET /v1/auth/validate
pub async fn validate(auth: Extension<Arc<Authenticator>>, headers: HeaderMap) -> Response {
    let Some(token) = extract_bearer_token(&headers) else {
        return missing_bearer();
    };
    match auth.validate(&token).await {
        Ok(result) => (
            status_code(result.status()),
            Json(ValidationResponse::from(&result)),
        )
            .into_response(),
        Err(err) => fault_response("validate", &err),
    }
}
