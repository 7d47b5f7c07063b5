//! Credential verification over an external password-hash capability.
//!
//! Hashes are PHC strings (`$argon2id$v=19$...`). Verification never retries:
//! a failure is final for that attempt.
//!
//! A principal that does not exist, or has no hash, still costs one hash
//! verification against a decoy so the response time does not reveal which
//! identifiers are registered.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier as _, Version,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::store::Principal;

/// Outcome of checking a secret against a stored hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordVerification {
    Success,
    /// The secret matched but the hash should be upgraded by the store.
    SuccessNeedsRehash,
    Failed,
}

impl PasswordVerification {
    #[must_use]
    pub const fn accepted(self) -> bool {
        matches!(self, Self::Success | Self::SuccessNeedsRehash)
    }
}

/// Password-hash verification capability.
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the stored hash cannot be processed at all; a
    /// mismatching secret is `Ok(Failed)`.
    async fn verify(
        &self,
        password_hash: &str,
        secret: &SecretString,
    ) -> Result<PasswordVerification>;

    /// Spend the same effort as [`verify`](Self::verify) when there is no
    /// hash to check against. The outcome is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error when the hashing capability itself fails.
    async fn verify_decoy(&self, secret: &SecretString) -> Result<()>;
}

/// Argon2id verifier. Hashes produced with other parameters still verify but
/// report [`PasswordVerification::SuccessNeedsRehash`].
#[derive(Clone, Debug)]
pub struct Argon2Verifier {
    params: Params,
    /// Hash of a random secret under `params`, built on first use.
    decoy: Arc<OnceCell<String>>,
}

impl Default for Argon2Verifier {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl Argon2Verifier {
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self {
            params,
            decoy: Arc::new(OnceCell::new()),
        }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a secret with the configured parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    pub fn hash(&self, secret: &SecretString) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher()
            .hash_password(secret.expose_secret().as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    fn decoy_hash(&self) -> Result<&str> {
        self.decoy
            .get_or_try_init(|| self.hash(&SecretString::from(uuid::Uuid::new_v4().to_string())))
            .map(String::as_str)
    }

    fn verify_blocking(&self, password_hash: &str, secret: &str) -> Result<PasswordVerification> {
        let parsed =
            PasswordHash::new(password_hash).map_err(|e| anyhow!("invalid password hash: {e}"))?;

        match self.hasher().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => {}
            Err(argon2::password_hash::Error::Password) => return Ok(PasswordVerification::Failed),
            Err(e) => return Err(anyhow!("password verification error: {e}")),
        }

        let current = parsed.algorithm == Algorithm::Argon2id.ident()
            && parsed.version == Some(Version::V0x13.into())
            && Params::try_from(&parsed).is_ok_and(|params| {
                params.m_cost() == self.params.m_cost()
                    && params.t_cost() == self.params.t_cost()
                    && params.p_cost() == self.params.p_cost()
            });

        Ok(if current {
            PasswordVerification::Success
        } else {
            PasswordVerification::SuccessNeedsRehash
        })
    }
}

#[async_trait]
impl PasswordVerifier for Argon2Verifier {
    async fn verify(
        &self,
        password_hash: &str,
        secret: &SecretString,
    ) -> Result<PasswordVerification> {
        let verifier = self.clone();
        let password_hash = password_hash.to_string();
        let secret = SecretString::from(secret.expose_secret().to_owned());
        // Argon2 is memory-hard; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            verifier.verify_blocking(&password_hash, secret.expose_secret())
        })
        .await
        .context("password verification task failed")?
    }

    async fn verify_decoy(&self, secret: &SecretString) -> Result<()> {
        let verifier = self.clone();
        let secret = SecretString::from(secret.expose_secret().to_owned());
        tokio::task::spawn_blocking(move || -> Result<()> {
            let decoy = verifier.decoy_hash()?;
            verifier.verify_blocking(decoy, secret.expose_secret())?;
            Ok(())
        })
        .await
        .context("decoy verification task failed")?
    }
}

/// Checks a presented secret against a principal's stored hash.
#[derive(Clone)]
pub struct CredentialVerifier {
    hasher: Arc<dyn PasswordVerifier>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(hasher: Arc<dyn PasswordVerifier>) -> Self {
        Self { hasher }
    }

    /// Principals without a stored hash never verify.
    ///
    /// # Errors
    ///
    /// Propagates hashing capability failures.
    pub async fn verify(
        &self,
        principal: &Principal,
        secret: &SecretString,
    ) -> Result<PasswordVerification> {
        match principal.password_hash.as_deref() {
            Some(hash) if !hash.is_empty() => self.hasher.verify(hash, secret).await,
            _ => self.reject(secret).await,
        }
    }

    /// Fail a secret that has nothing to be checked against, at the cost of
    /// a real verification.
    ///
    /// # Errors
    ///
    /// Propagates hashing capability failures.
    pub async fn reject(&self, secret: &SecretString) -> Result<PasswordVerification> {
        self.hasher.verify_decoy(secret).await?;
        Ok(PasswordVerification::Failed)
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}
