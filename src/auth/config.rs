//! Startup configuration for the token flows.

use std::time::Duration;

use super::claims::ClaimTypes;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;
/// Longest accepted token lifetime: one (leap) year.
pub const MAX_TOKEN_TTL_SECONDS: i64 = 366 * 24 * 60 * 60;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_ttl_seconds: i64,
    claim_types: ClaimTypes,
    call_timeout: Option<Duration>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            claim_types: ClaimTypes::default(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }

    /// Clamped to `1..=MAX_TOKEN_TTL_SECONDS`.
    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds.clamp(1, MAX_TOKEN_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_claim_types(mut self, claim_types: ClaimTypes) -> Self {
        self.claim_types = claim_types;
        self
    }

    /// Deadline applied to every flow; `None` disables it.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn claim_types(&self) -> &ClaimTypes {
        &self.claim_types
    }

    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }
}
