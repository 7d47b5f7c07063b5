//! Token authority core.
//!
//! Flow Overview:
//! 1) `authenticate`: resolve the principal from id, username or email
//!    candidates, verify the secret, assemble claims, sign with now + TTL.
//! 2) `validate`: parse and verify the token, resolve its principal, compare
//!    the stamp suffix. Read-only.
//! 3) `refresh`: validate (optionally without the stamp comparison), rotate
//!    the principal's stamp, issue a new token.
//!
//! Security boundaries:
//! - Unknown principals and wrong secrets share one rejection message.
//! - Only the last 8 characters of a stamp leave the store.
//! - Faults (store, signer, deadline) surface as `Err`, never as a rejection.

pub mod claims;
pub mod clock;
pub mod codec;
pub mod config;
pub mod credential;
pub mod jwt;
pub mod memory;
pub mod postgres;
mod refresh;
pub mod result;
mod service;
pub mod stamp;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
mod validate;

pub use claims::{Claim, ClaimAssembler, ClaimSet, ClaimTypes};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{ParsedToken, TokenCodec, TokenError};
pub use config::AuthConfig;
pub use credential::{Argon2Verifier, PasswordVerification, PasswordVerifier};
pub use jwt::{Jwk, Jwks, Rs256Codec};
pub use memory::{MemoryStore, SeedPrincipal};
pub use postgres::PgStore;
pub use result::{
    AuthResult, IssuedToken, Rejection, RejectionKind, Status, ValidatedToken, ValidationResult,
};
pub use service::{Authenticator, Credentials};
pub use store::{Identifiers, Principal, PrincipalStore, Role, StoreProvider};
