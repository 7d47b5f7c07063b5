//! # Tessera (stamp-revoked bearer token authority)
//!
//! `tessera` verifies a principal's credentials, issues signed, time-bounded
//! tokens carrying identity and role claims, validates those tokens on every
//! protected request, and rotates them on refresh.
//!
//! ## Revocation without sessions
//!
//! Nothing about an issued token is stored. Every principal carries an opaque
//! **stamp**; the last 8 characters of it travel inside each token. Rotating
//! the stamp (which `refresh` does) makes every token issued before the
//! rotation stale, and expiry is the only other way a token stops working.
//!
//! ## Layout
//!
//! - [`auth`] is the core: claim assembly, credential verification, the token
//!   codec, and the authenticate / validate / refresh flows.
//! - [`api`] is a thin axum adapter exposing the flows over HTTP.
//! - [`cli`] parses configuration and starts the server.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }
}
