#![allow(dead_code)]

use tessera::auth::{
    Argon2Verifier, AuthConfig, Authenticator, Credentials, ManualClock, MemoryStore, Rs256Codec,
    SeedPrincipal,
};

mod fixture;

pub use fixture::*;
