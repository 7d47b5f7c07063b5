//! RS256 compact JWS codec.
//!
//! Tokens are `header.payload.signature`, each part base64url without padding.
//! The payload carries the claim set as ordered `[type, value]` pairs next to
//! the registered `iss`, `aud`, `iat` and `exp` fields.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::claims::ClaimSet;
use super::codec::{ParsedToken, TokenCodec, TokenError};

pub const TOKEN_VERSION: u8 = 1;
const ALG_RS256: &str = "RS256";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to parse RSA key")]
    Parse,
    #[error("rsa error")]
    Rsa(#[from] rsa::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Header {
    alg: String,
    typ: String,
    kid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Payload {
    v: u8,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
    claims: ClaimSet,
}

/// Public half of a signing key, in JWK form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    fn from_rsa_public_key(public_key: &RsaPublicKey, kid: &str) -> Self {
        Self {
            kty: "RSA".to_string(),
            alg: ALG_RS256.to_string(),
            key_use: "sig".to_string(),
            kid: kid.to_string(),
            n: Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be()),
            e: Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

struct VerificationKey {
    kid: String,
    public_key: RsaPublicKey,
}

/// RS256 signer/verifier holding one signing key and any number of
/// verification keys (the signing key's public half is always one of them).
pub struct Rs256Codec {
    kid: String,
    issuer: String,
    audience: String,
    signing_key: SigningKey<Sha256>,
    verification_keys: Vec<VerificationKey>,
}

impl Rs256Codec {
    /// Build a codec from a PEM or DER (PKCS#8 or PKCS#1) private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be parsed.
    pub fn from_private_key_pem_or_der(
        pem_or_der: &[u8],
        kid: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let private_key = decode_private_key(pem_or_der)?;
        let kid = kid.into();
        let verification_keys = vec![VerificationKey {
            kid: kid.clone(),
            public_key: RsaPublicKey::from(&private_key),
        }];
        Ok(Self {
            kid,
            issuer: issuer.into(),
            audience: audience.into(),
            signing_key: SigningKey::<Sha256>::new(private_key),
            verification_keys,
        })
    }

    /// Also accept tokens signed by a retired key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be parsed.
    pub fn with_verification_key(
        mut self,
        kid: impl Into<String>,
        public_pem_or_der: &[u8],
    ) -> Result<Self, KeyError> {
        let kid = kid.into();
        let public_key = decode_public_key(public_pem_or_der)?;
        self.verification_keys.retain(|k| k.kid != kid);
        self.verification_keys.push(VerificationKey { kid, public_key });
        Ok(self)
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Every key tokens are verified against.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: self
                .verification_keys
                .iter()
                .map(|k| Jwk::from_rsa_public_key(&k.public_key, &k.kid))
                .collect(),
        }
    }

    fn encode(&self, payload: &Payload) -> Result<String, TokenError> {
        let header = Header {
            alg: ALG_RS256.to_string(),
            typ: "JWT".to_string(),
            kid: self.kid.clone(),
        };
        let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(payload)?);
        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());
        Ok(format!("{signing_input}.{signature_b64}"))
    }

    fn decode(&self, token: &str, now: i64) -> Result<Payload, TokenError> {
        let mut parts = token.trim().split('.');
        let header_b64 = parts.next().ok_or(TokenError::Format)?;
        let payload_b64 = parts.next().ok_or(TokenError::Format)?;
        let sig_b64 = parts.next().ok_or(TokenError::Format)?;
        if parts.next().is_some() {
            return Err(TokenError::Format);
        }

        let header: Header = b64d_json(header_b64)?;
        if header.alg != ALG_RS256 {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }
        let key = self
            .verification_keys
            .iter()
            .find(|k| k.kid == header.kid)
            .ok_or_else(|| TokenError::UnknownKid(header.kid.clone()))?;

        let verifying_key = VerifyingKey::<Sha256>::new(key.public_key.clone());
        let signature_bytes =
            Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        let signature = Signature::try_from(signature_bytes.as_slice())
            .map_err(|_| TokenError::InvalidSignature)?;
        let signing_input = format!("{header_b64}.{payload_b64}");
        verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload: Payload = b64d_json(payload_b64)?;
        if payload.v != TOKEN_VERSION {
            return Err(TokenError::InvalidVersion);
        }
        if payload.iss != self.issuer {
            return Err(TokenError::InvalidIssuer);
        }
        if payload.aud != self.audience {
            return Err(TokenError::InvalidAudience);
        }
        if payload.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(payload)
    }
}

impl std::fmt::Debug for Rs256Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rs256Codec")
            .field("kid", &self.kid)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("signing_key", &"***")
            .field("verification_keys", &self.verification_keys.len())
            .finish()
    }
}

#[async_trait]
impl TokenCodec for Rs256Codec {
    async fn sign(
        &self,
        claims: &ClaimSet,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let payload = Payload {
            v: TOKEN_VERSION,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            claims: claims.clone(),
        };
        self.encode(&payload)
            .map_err(|e| anyhow!("failed to sign token: {e}"))
    }

    fn parse(&self, token: &str, now: DateTime<Utc>) -> Result<ParsedToken, TokenError> {
        let payload = self.decode(token, now.timestamp())?;
        let issued_at =
            DateTime::from_timestamp(payload.iat, 0).ok_or(TokenError::InvalidTimestamp)?;
        let expires_at =
            DateTime::from_timestamp(payload.exp, 0).ok_or(TokenError::InvalidTimestamp)?;
        Ok(ParsedToken {
            claims: payload.claims,
            issued_at,
            expires_at,
        })
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, KeyError> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let s = std::str::from_utf8(pem_or_der).map_err(|_| KeyError::Parse)?;
        return RsaPrivateKey::from_pkcs8_pem(s)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(s))
            .map_err(|_| KeyError::Parse);
    }
    RsaPrivateKey::from_pkcs8_der(pem_or_der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(pem_or_der))
        .map_err(|_| KeyError::Parse)
}

fn decode_public_key(pem_or_der: &[u8]) -> Result<RsaPublicKey, KeyError> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let s = std::str::from_utf8(pem_or_der).map_err(|_| KeyError::Parse)?;
        return RsaPublicKey::from_public_key_pem(s)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(s))
            .map_err(|_| KeyError::Parse);
    }
    RsaPublicKey::from_public_key_der(pem_or_der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(pem_or_der))
        .map_err(|_| KeyError::Parse)
}
