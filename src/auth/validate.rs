//! Token validation for protected requests. Never mutates state.

use anyhow::Result;
use tracing::{debug, instrument, warn};

use super::{
    codec::ParsedToken,
    result::{Rejection, RejectionKind, ValidatedToken, ValidationResult, STALE_TOKEN},
    service::Authenticator,
    store::{resolve_principal, Principal, PrincipalStore},
};

/// Result of parsing a token and resolving whom it names.
pub(super) enum TokenSubject {
    Resolved {
        principal: Principal,
        parsed: ParsedToken,
    },
    Rejected(Rejection),
}

impl Authenticator {
    /// Check signature, expiry, principal existence and stamp freshness.
    ///
    /// # Errors
    ///
    /// Returns an error only for faults (store failures, deadline).
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<ValidationResult> {
        self.within_deadline("validate", self.validate_scoped(token))
            .await
    }

    async fn validate_scoped(&self, token: &str) -> Result<ValidationResult> {
        let mut store = self.stores.scope().await?;

        let (principal, parsed) = match self.resolve_subject(store.as_mut(), token).await? {
            TokenSubject::Resolved { principal, parsed } => (principal, parsed),
            TokenSubject::Rejected(rejection) => return Ok(ValidationResult::Rejected(rejection)),
        };

        if !self.guard.check(&parsed.claims, &principal) {
            warn!("Token validation failed: stale stamp for '{}'", principal.id);
            return Ok(ValidationResult::Rejected(Rejection::new(
                RejectionKind::StampMismatch,
                STALE_TOKEN,
            )));
        }

        Ok(ValidationResult::Valid(ValidatedToken {
            principal,
            claims: parsed.claims,
            expires_at: parsed.expires_at,
        }))
    }

    /// Parse `token` and resolve its principal from the id, username and
    /// email claims, in that order.
    pub(super) async fn resolve_subject(
        &self,
        store: &mut dyn PrincipalStore,
        token: &str,
    ) -> Result<TokenSubject> {
        let parsed = match self.codec.parse(token, self.clock.now()) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("Token rejected by codec: {err}");
                return Ok(TokenSubject::Rejected(Rejection::token(&err)));
            }
        };

        let identifiers = parsed.claims.identifiers(self.config.claim_types());
        match resolve_principal(store, &identifiers).await? {
            Some(principal) => Ok(TokenSubject::Resolved { principal, parsed }),
            None => {
                warn!(
                    "Token subject '{}' not found",
                    identifiers.first_non_empty().unwrap_or_default()
                );
                Ok(TokenSubject::Rejected(Rejection::not_found()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::result::{RejectionKind, Status};
    use crate::auth::testing::{fixture, login};
    use anyhow::Result;

    #[tokio::test]
    async fn accepts_fresh_token_and_resolves_principal() -> Result<()> {
        let fx = fixture()?;
        let token = login(&fx, "alice").await?;

        let result = fx.auth.validate(&token).await?;
        assert_eq!(result.status(), Status::Ok);
        assert_eq!(result.principal().map(|p| p.id.as_str()), Some("u1"));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_at_and_after_expiry() -> Result<()> {
        let fx = fixture()?;
        let token = login(&fx, "u1").await?;

        fx.clock.set(3599);
        assert_eq!(fx.auth.validate(&token).await?.status(), Status::Ok);

        fx.clock.set(3600);
        let result = fx.auth.validate(&token).await?;
        assert_eq!(result.status(), Status::Rejected);
        assert_eq!(
            result.rejection().map(|r| r.kind),
            Some(RejectionKind::TokenExpired)
        );
        Ok(())
    }

    #[tokio::test]
    async fn rejects_corrupted_tokens_without_fault() -> Result<()> {
        let fx = fixture()?;
        let token = login(&fx, "u1").await?;
        let truncated = &token[..token.len() - 4];

        for garbage in ["", "garbage", "a.b.c", truncated] {
            let result = fx.auth.validate(garbage).await?;
            assert_eq!(result.status(), Status::Rejected, "input {garbage:?}");
            assert_eq!(
                result.rejection().map(|r| r.kind),
                Some(RejectionKind::TokenMalformed)
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn deleted_principal_is_not_found() -> Result<()> {
        let fx = fixture()?;
        let token = login(&fx, "u1").await?;
        fx.store.remove("u1").await;

        let result = fx.auth.validate(&token).await?;
        assert_eq!(result.status(), Status::NotFound);
        Ok(())
    }

    #[tokio::test]
    async fn out_of_band_stamp_change_makes_token_stale() -> Result<()> {
        let fx = fixture()?;
        let token = login(&fx, "u1").await?;
        fx.store
            .set_stamp("u1", Some("changed-elsewhere".to_string()))
            .await;

        let result = fx.auth.validate(&token).await?;
        assert_eq!(result.status(), Status::Rejected);
        assert_eq!(
            result.rejection().map(|r| r.kind),
            Some(RejectionKind::StampMismatch)
        );
        assert_eq!(result.message(), Some("Stale token."));
        Ok(())
    }

    #[tokio::test]
    async fn validation_does_not_touch_the_stamp() -> Result<()> {
        let fx = fixture()?;
        let token = login(&fx, "u1").await?;
        let before = fx.store.principal("u1").await;
        fx.auth.validate(&token).await?;
        assert_eq!(fx.store.principal("u1").await, before);
        Ok(())
    }
}
