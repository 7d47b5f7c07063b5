mod common;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{fixture, login, CORRECT_PW};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tessera::auth::{
    AuthConfig, Authenticator, ClaimTypes, Clock, Credentials, Identifiers, PrincipalStore,
    RejectionKind, Status, StoreProvider, TokenCodec,
};

#[tokio::test]
async fn u1_lifecycle() -> Result<()> {
    let h = fixture()?;
    let types = ClaimTypes::default();

    // authenticate at t=0
    let issued = h
        .auth
        .authenticate(&Credentials::from_identifier("u1", SecretString::from(CORRECT_PW)))
        .await?;
    assert_eq!(issued.status().code(), 200);
    assert_eq!(issued.expires_at().map(|e| e.timestamp()), Some(3600));
    let t1 = issued.token().ok_or_else(|| anyhow!("no token"))?.to_string();

    let claims = h.codec.parse(&t1, h.clock.now())?.claims;
    assert_eq!(claims.first(&types.id), Some("u1"));
    assert_eq!(claims.first(&types.username), Some("alice"));
    assert_eq!(claims.first(&types.email), Some("alice@tessera.dev"));
    assert_eq!(claims.first(&types.stamp), Some("abc12345"));
    assert_eq!(
        claims.values(&types.role).collect::<Vec<_>>(),
        vec!["admin", "user"]
    );

    // validate at t=100
    h.clock.set(100);
    let valid = h.auth.validate(&t1).await?;
    assert_eq!(valid.status(), Status::Ok);
    assert_eq!(valid.principal().map(|p| p.id.as_str()), Some("u1"));

    // refresh at t=200
    h.clock.set(200);
    let refreshed = h.auth.refresh(&t1, false).await?;
    assert_eq!(refreshed.status(), Status::Ok);
    assert_eq!(refreshed.expires_at().map(|e| e.timestamp()), Some(3800));
    let t2 = refreshed
        .token()
        .ok_or_else(|| anyhow!("no token"))?
        .to_string();

    // the presented token is now stale, the new one is good
    h.clock.set(201);
    let stale = h.auth.validate(&t1).await?;
    assert_eq!(stale.status().code(), 403);
    assert_eq!(stale.message(), Some("Stale token."));
    assert_eq!(h.auth.validate(&t2).await?.status(), Status::Ok);

    // refreshing the old token again is refused
    let again = h.auth.refresh(&t1, false).await?;
    assert_eq!(again.message(), Some("Invalid security stamp."));

    // t2 expires at 3800
    h.clock.set(3800);
    assert_eq!(
        h.auth.validate(&t2).await?.rejection().map(|r| r.kind),
        Some(RejectionKind::TokenExpired)
    );
    Ok(())
}

#[tokio::test]
async fn unknown_identifier_and_wrong_secret_are_indistinguishable() -> Result<()> {
    let h = fixture()?;
    let unknown = h
        .auth
        .authenticate(&Credentials::from_identifier(
            "mallory",
            SecretString::from(CORRECT_PW),
        ))
        .await?;
    let wrong = h
        .auth
        .authenticate(&Credentials::from_identifier("alice", SecretString::from("nope")))
        .await?;
    assert_eq!(unknown, wrong);
    assert_eq!(unknown.status().code(), 403);
    Ok(())
}

#[tokio::test]
async fn each_authentication_gets_a_fresh_token_id() -> Result<()> {
    let h = fixture()?;
    let a = login(&h, "u1").await?;
    let b = login(&h, "u1").await?;
    let id_a = h.codec.parse(&a, h.clock.now())?.claims.token_id().map(str::to_string);
    let id_b = h.codec.parse(&b, h.clock.now())?.claims.token_id().map(str::to_string);
    assert!(id_a.is_some());
    assert_ne!(id_a, id_b);
    Ok(())
}

#[tokio::test]
async fn identifier_candidates_fall_through() -> Result<()> {
    let h = fixture()?;
    let credentials = Credentials::new(
        Identifiers {
            id: Some("no-such-id".to_string()),
            username: None,
            email: Some("ALICE@tessera.dev".to_string()),
        },
        SecretString::from(CORRECT_PW),
    );
    let result = h.auth.authenticate(&credentials).await?;
    assert_eq!(result.status(), Status::Ok);
    Ok(())
}

#[tokio::test]
async fn skip_stamp_check_rescues_a_stale_token_and_rotates() -> Result<()> {
    let h = fixture()?;
    let t1 = login(&h, "u1").await?;
    h.store.set_stamp("u1", Some("rotated-by-admin".to_string())).await;
    assert_eq!(h.auth.validate(&t1).await?.status(), Status::Rejected);

    let forced = h.auth.refresh(&t1, true).await?;
    assert_eq!(forced.status(), Status::Ok);
    let stamp = h.store.principal("u1").await.and_then(|p| p.stamp);
    assert!(stamp.is_some_and(|s| s != "rotated-by-admin"));
    Ok(())
}

#[tokio::test]
async fn unstamped_principal_round_trips_with_sentinel() -> Result<()> {
    let h = fixture()?;
    h.store.set_stamp("u1", None).await;
    let token = login(&h, "u1").await?;
    let claims = h.codec.parse(&token, h.clock.now())?.claims;
    assert_eq!(claims.first(&ClaimTypes::default().stamp), Some("00000000"));
    assert_eq!(h.auth.validate(&token).await?.status(), Status::Ok);
    Ok(())
}

#[tokio::test]
async fn tampered_signature_is_malformed() -> Result<()> {
    let h = fixture()?;
    let token = login(&h, "u1").await?;
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    if let Some(sig) = parts.get_mut(2) {
        *sig = sig.chars().rev().collect();
    }
    let tampered = parts.join(".");
    let result = h.auth.validate(&tampered).await?;
    assert_eq!(
        result.rejection().map(|r| r.kind),
        Some(RejectionKind::TokenMalformed)
    );
    Ok(())
}

struct BrokenStore;

#[async_trait]
impl StoreProvider for BrokenStore {
    async fn scope(&self) -> Result<Box<dyn PrincipalStore>> {
        Err(anyhow!("store unreachable"))
    }
}

struct StalledStore;

#[async_trait]
impl StoreProvider for StalledStore {
    async fn scope(&self) -> Result<Box<dyn PrincipalStore>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(anyhow!("unreachable"))
    }
}

fn authenticator_over(stores: Arc<dyn StoreProvider>, timeout: Duration) -> Result<Authenticator> {
    Ok(Authenticator::new(
        AuthConfig::new().with_call_timeout(Some(timeout)),
        stores,
        Arc::new(common::fast_verifier()?),
        Arc::new(common::codec()?),
    ))
}

#[tokio::test]
async fn store_failures_are_faults_not_rejections() -> Result<()> {
    let auth = authenticator_over(Arc::new(BrokenStore), Duration::from_secs(1))?;
    let err = auth
        .authenticate(&Credentials::from_identifier("u1", SecretString::from(CORRECT_PW)))
        .await
        .err()
        .map(|e| e.to_string());
    assert_eq!(err.as_deref(), Some("store unreachable"));
    assert!(auth.validate("a.b.c").await.is_err());
    Ok(())
}

#[tokio::test]
async fn calls_past_the_deadline_fail() -> Result<()> {
    let auth = authenticator_over(Arc::new(StalledStore), Duration::from_millis(50))?;
    let err = auth.refresh("a.b.c", false).await.err().map(|e| e.to_string());
    assert!(err.is_some_and(|e| e.contains("deadline")));
    Ok(())
}
