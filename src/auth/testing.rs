//! Flow-test fixture, shared with the integration tests under `tests/`.

use super::{
    clock::ManualClock,
    config::AuthConfig,
    credential::Argon2Verifier,
    jwt::Rs256Codec,
    memory::{MemoryStore, SeedPrincipal},
    service::{Authenticator, Credentials},
};

#[path = "../../tests/common/fixture.rs"]
mod fixture;

pub use fixture::*;
