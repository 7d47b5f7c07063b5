//! Claim sets and their assembly for a principal.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::store::{Identifiers, Principal, PrincipalStore};

/// Registered claim type for the per-issuance token id.
pub const TOKEN_ID_CLAIM: &str = "jti";

/// Stamp suffix used for principals without a stamp.
pub const UNSTAMPED: &str = "00000000";

/// Number of trailing stamp characters carried in a token.
pub const STAMP_SUFFIX_LEN: usize = 8;

/// Claim type names, fixed at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimTypes {
    pub id: String,
    pub username: String,
    pub email: String,
    pub stamp: String,
    pub role: String,
}

impl Default for ClaimTypes {
    fn default() -> Self {
        Self {
            id: "sub".to_string(),
            username: "name".to_string(),
            email: "email".to_string(),
            stamp: "stamp".to_string(),
            role: "role".to_string(),
        }
    }
}

/// A single `(type, value)` claim. Serialized as a two element array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim(pub String, pub String);

impl Claim {
    #[must_use]
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self(kind.into(), value.into())
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.1
    }
}

/// Ordered claims embedded in one token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Vec<Claim>);

impl ClaimSet {
    pub fn push(&mut self, kind: impl Into<String>, value: impl Into<String>) {
        self.0.push(Claim::new(kind, value));
    }

    /// Value of the first claim of `kind`.
    #[must_use]
    pub fn first(&self, kind: &str) -> Option<&str> {
        self.0.iter().find(|c| c.kind() == kind).map(Claim::value)
    }

    /// Values of every claim of `kind`, in order.
    pub fn values<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |c| c.kind() == kind)
            .map(Claim::value)
    }

    #[must_use]
    pub fn token_id(&self) -> Option<&str> {
        self.first(TOKEN_ID_CLAIM)
    }

    /// Identity candidates carried by the token.
    #[must_use]
    pub fn identifiers(&self, types: &ClaimTypes) -> Identifiers {
        Identifiers {
            id: self.first(&types.id).map(str::to_string),
            username: self.first(&types.username).map(str::to_string),
            email: self.first(&types.email).map(str::to_string),
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Claim] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Claim> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Last [`STAMP_SUFFIX_LEN`] characters of a stamp, or [`UNSTAMPED`].
/// Stamps shorter than the suffix length are carried whole.
#[must_use]
pub fn stamp_suffix(stamp: Option<&str>) -> String {
    match stamp {
        Some(stamp) if !stamp.is_empty() => {
            let count = stamp.chars().count();
            stamp
                .chars()
                .skip(count.saturating_sub(STAMP_SUFFIX_LEN))
                .collect()
        }
        _ => UNSTAMPED.to_string(),
    }
}

/// Builds the canonical claim set for a principal.
#[derive(Clone, Debug, Default)]
pub struct ClaimAssembler {
    types: ClaimTypes,
}

impl ClaimAssembler {
    #[must_use]
    pub fn new(types: ClaimTypes) -> Self {
        Self { types }
    }

    #[must_use]
    pub fn types(&self) -> &ClaimTypes {
        &self.types
    }

    /// Token id, identity, email, stamp suffix, then one claim per role.
    ///
    /// # Errors
    ///
    /// Propagates store failures while fetching roles.
    pub async fn assemble(
        &self,
        store: &mut dyn PrincipalStore,
        principal: &Principal,
    ) -> Result<ClaimSet> {
        let mut claims = ClaimSet::default();
        claims.push(TOKEN_ID_CLAIM, uuid::Uuid::new_v4().to_string());
        claims.push(&self.types.id, &principal.id);
        claims.push(&self.types.username, &principal.username);
        claims.push(&self.types.email, &principal.email);
        claims.push(&self.types.stamp, stamp_suffix(principal.stamp.as_deref()));

        for role in store.roles(principal).await? {
            claims.push(&self.types.role, role.name);
        }

        Ok(claims)
    }
}
