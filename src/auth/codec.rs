//! Token signing capability and its typed parse failures.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::claims::ClaimSet;

/// Why a presented token was not accepted by the codec.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid token version")]
    InvalidVersion,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("token expired")]
    Expired,
}

impl TokenError {
    /// Expired tokens were once valid; everything else is malformed or forged.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

/// Claims recovered from a token whose signature and expiry checked out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedToken {
    pub claims: ClaimSet,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs claim sets into opaque tokens and verifies them back.
#[async_trait]
pub trait TokenCodec: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the signing capability is unavailable.
    async fn sign(
        &self,
        claims: &ClaimSet,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String>;

    /// A token is accepted strictly before its expiry instant.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Expired`] at or after expiry and another variant
    /// for anything malformed, unsigned or foreign.
    fn parse(&self, token: &str, now: DateTime<Utc>) -> Result<ParsedToken, TokenError>;
}
