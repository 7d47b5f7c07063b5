//! Token refresh: re-validate, rotate the stamp, reissue.
//!
//! Rotation is the revocation step. Once the store write completes, every
//! token issued earlier for the principal, including the one presented here,
//! fails the stamp check. Two refreshes racing for the same principal are not
//! serialized here; the store's last write wins.

use anyhow::Result;
use tracing::{debug, instrument, warn};

use super::{
    result::{AuthResult, Rejection, RejectionKind, INVALID_SECURITY_STAMP},
    service::Authenticator,
    validate::TokenSubject,
};

impl Authenticator {
    /// Exchange a valid token for a new one and revoke all earlier tokens.
    ///
    /// `skip_stamp_check` accepts a token whose stamp was already rotated out
    /// of band (for instance right after a password change). It weakens
    /// revocation for that call and should only be reachable from trusted
    /// internal callers.
    ///
    /// # Errors
    ///
    /// Returns an error only for faults (store, signing, deadline).
    #[instrument(skip_all, fields(skip_stamp_check))]
    pub async fn refresh(&self, token: &str, skip_stamp_check: bool) -> Result<AuthResult> {
        self.within_deadline("refresh", self.refresh_scoped(token, skip_stamp_check))
            .await
    }

    async fn refresh_scoped(&self, token: &str, skip_stamp_check: bool) -> Result<AuthResult> {
        let mut store = self.stores.scope().await?;

        let (principal, parsed) = match self.resolve_subject(store.as_mut(), token).await? {
            TokenSubject::Resolved { principal, parsed } => (principal, parsed),
            TokenSubject::Rejected(rejection) => return Ok(AuthResult::Rejected(rejection)),
        };

        if skip_stamp_check {
            debug!("Stamp check skipped for '{}'", principal.id);
        } else if !self.guard.check(&parsed.claims, &principal) {
            warn!("Token refresh failed: invalid security stamp for '{}'", principal.id);
            return Ok(AuthResult::Rejected(Rejection::new(
                RejectionKind::StampMismatch,
                INVALID_SECURITY_STAMP,
            )));
        }

        let rotated = store.rotate_stamp(&principal).await?;
        debug!("Rotated stamp for '{}'", rotated.id);

        self.issue(store.as_mut(), &rotated).await
    }
}
