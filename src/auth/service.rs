//! `Authenticator`: credential authentication and token issuance.
//!
//! Flow Overview: acquire a scoped store handle, resolve the principal from
//! the identifier candidates, verify the secret, assemble claims and sign.
//! Unknown principals and wrong secrets produce the same rejection at the
//! same hashing cost; the difference only shows up in logs.

use anyhow::{anyhow, Result};
use chrono::{Duration, SubsecRound};
use secrecy::SecretString;
use std::{future::Future, sync::Arc};
use tracing::{debug, instrument, warn};

use super::{
    claims::ClaimAssembler,
    clock::{Clock, SystemClock},
    codec::TokenCodec,
    config::AuthConfig,
    credential::{CredentialVerifier, PasswordVerifier},
    result::{AuthResult, IssuedToken, Rejection},
    stamp::StampGuard,
    store::{resolve_principal, Identifiers, Principal, PrincipalStore, StoreProvider},
};

/// Identifier candidates plus the presented secret.
#[derive(Debug)]
pub struct Credentials {
    pub identifiers: Identifiers,
    pub secret: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(identifiers: Identifiers, secret: SecretString) -> Self {
        Self {
            identifiers,
            secret,
        }
    }

    /// A single identifier, tried as id, then username, then email.
    #[must_use]
    pub fn from_identifier(identifier: &str, secret: SecretString) -> Self {
        Self::new(
            Identifiers {
                id: Some(identifier.to_string()),
                username: Some(identifier.to_string()),
                email: Some(identifier.to_string()),
            },
            secret,
        )
    }
}

/// Stateless token authority. Cheap to share behind an `Arc`.
pub struct Authenticator {
    pub(super) stores: Arc<dyn StoreProvider>,
    pub(super) credentials: CredentialVerifier,
    pub(super) codec: Arc<dyn TokenCodec>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) assembler: ClaimAssembler,
    pub(super) guard: StampGuard,
    pub(super) config: AuthConfig,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        stores: Arc<dyn StoreProvider>,
        hasher: Arc<dyn PasswordVerifier>,
        codec: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            stores,
            credentials: CredentialVerifier::new(hasher),
            codec,
            clock: Arc::new(SystemClock),
            assembler: ClaimAssembler::new(config.claim_types().clone()),
            guard: StampGuard::new(config.claim_types()),
            config,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Verify credentials and issue a token.
    ///
    /// # Errors
    ///
    /// Returns an error only for faults: store or hasher failures, signing
    /// failures, or the call deadline passing.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult> {
        self.within_deadline("authenticate", self.authenticate_scoped(credentials))
            .await
    }

    async fn authenticate_scoped(&self, credentials: &Credentials) -> Result<AuthResult> {
        let mut store = self.stores.scope().await?;

        let Some(principal) = resolve_principal(store.as_mut(), &credentials.identifiers).await?
        else {
            self.credentials.reject(&credentials.secret).await?;
            warn!(
                "Authentication failed: principal '{}' not found",
                credentials.identifiers.first_non_empty().unwrap_or_default()
            );
            return Ok(AuthResult::Rejected(Rejection::credentials()));
        };

        let verification = self
            .credentials
            .verify(&principal, &credentials.secret)
            .await?;
        if !verification.accepted() {
            warn!(
                "Authentication failed: password verification failed for '{}'",
                principal.id
            );
            return Ok(AuthResult::Rejected(Rejection::credentials()));
        }

        debug!("Authenticated principal {}", principal.id);
        self.issue(store.as_mut(), &principal).await
    }

    /// Assemble claims for `principal` and sign them with expiry now + TTL.
    ///
    /// Tokens carry whole seconds, so both instants are truncated first and
    /// the reported expiry is exactly the signed one.
    pub(super) async fn issue(
        &self,
        store: &mut dyn PrincipalStore,
        principal: &Principal,
    ) -> Result<AuthResult> {
        let issued_at = self.clock.now().trunc_subsecs(0);
        let ttl = Duration::try_seconds(self.config.token_ttl_seconds())
            .ok_or_else(|| anyhow!("token TTL out of range"))?;
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow!("token expiry overflows at {issued_at}"))?;
        let claims = self.assembler.assemble(store, principal).await?;
        let token = self.codec.sign(&claims, issued_at, expires_at).await?;
        Ok(AuthResult::Issued(IssuedToken { token, expires_at }))
    }

    /// Run `fut` under the configured call deadline. Dropping the inner
    /// future releases its store handle.
    pub(super) async fn within_deadline<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.config.call_timeout() {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| anyhow!("{operation} exceeded its {limit:?} deadline"))?,
            None => fut.await,
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
