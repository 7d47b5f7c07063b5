//! Seeded authenticator shared by the unit and integration tests.
//!
//! The including module brings the `tessera::auth` types into scope, so the
//! same file builds against the crate from inside and from `tests/`.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use argon2::Params;
use secrecy::SecretString;
use std::sync::Arc;

use super::{
    Argon2Verifier, AuthConfig, Authenticator, Credentials, ManualClock, MemoryStore, Rs256Codec,
    SeedPrincipal,
};

pub const CORRECT_PW: &str = "correct-pw";
pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
pub const KEY_ID: &str = "test-key";
pub const ISSUER: &str = "https://tessera.example.test";
pub const AUDIENCE: &str = "tessera";

pub struct Fixture {
    pub auth: Arc<Authenticator>,
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub codec: Arc<Rs256Codec>,
}

/// Argon2id with minimal cost so tests hash in microseconds.
pub fn fast_verifier() -> Result<Argon2Verifier> {
    let params = Params::new(1024, 1, 1, None).map_err(|e| anyhow!("argon2 params: {e}"))?;
    Ok(Argon2Verifier::new(params))
}

pub fn codec() -> Result<Rs256Codec> {
    Ok(Rs256Codec::from_private_key_pem_or_der(
        SIGNING_KEY_PEM.as_bytes(),
        KEY_ID,
        ISSUER,
        AUDIENCE,
    )?)
}

/// `u1`/alice with a password, stamp `abc12345` and roles admin and user.
/// `u2`/bob has neither password nor stamp.
pub fn seed(password_hash: String) -> Vec<SeedPrincipal> {
    vec![
        SeedPrincipal::new("u1", "alice", "alice@tessera.dev")
            .with_password_hash(password_hash)
            .with_stamp("abc12345")
            .with_roles(&["admin", "user"]),
        SeedPrincipal::new("u2", "bob", "bob@tessera.dev"),
    ]
}

/// The clock starts at the epoch and tokens live for an hour.
pub fn fixture() -> Result<Fixture> {
    let verifier = fast_verifier()?;
    let store = MemoryStore::from_seed(seed(verifier.hash(&SecretString::from(CORRECT_PW))?));
    let clock = Arc::new(ManualClock::at(0));
    let codec = Arc::new(codec()?);

    let auth = Authenticator::new(
        AuthConfig::new().with_token_ttl_seconds(3600),
        Arc::new(store.clone()),
        Arc::new(verifier),
        codec.clone(),
    )
    .with_clock(clock.clone());

    Ok(Fixture {
        auth: Arc::new(auth),
        store,
        clock,
        codec,
    })
}

/// Authenticate with the fixture password and return the token.
pub async fn login(fx: &Fixture, identifier: &str) -> Result<String> {
    let result = fx
        .auth
        .authenticate(&Credentials::from_identifier(
            identifier,
            SecretString::from(CORRECT_PW),
        ))
        .await?;
    result
        .token()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("login as {identifier} was rejected: {result:?}"))
}
