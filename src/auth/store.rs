//! Principal records and the store capabilities the core consumes.
//!
//! The core never owns principal state. Each flow acquires a short-lived
//! [`PrincipalStore`] handle through [`StoreProvider::scope`] and drops it on
//! every exit path, which is what returns pooled connections.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity record as held by the principal store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub email: String,
    /// PHC-encoded hash; verified, never inspected by the flows.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub stamp: Option<String>,
}

/// Role membership; one claim per membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
}

impl Role {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Candidate identifiers for a principal, tried in field order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identifiers {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl Identifiers {
    /// First non-empty candidate, used for logging only.
    #[must_use]
    pub fn first_non_empty(&self) -> Option<&str> {
        [&self.id, &self.username, &self.email]
            .into_iter()
            .filter_map(|candidate| candidate.as_deref())
            .find(|candidate| !candidate.is_empty())
    }
}

/// Per-call handle to the principal store.
#[async_trait]
pub trait PrincipalStore: Send {
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Principal>>;

    async fn find_by_username(&mut self, username: &str) -> Result<Option<Principal>>;

    async fn find_by_email(&mut self, email: &str) -> Result<Option<Principal>>;

    /// Role memberships in a stable order.
    async fn roles(&mut self, principal: &Principal) -> Result<Vec<Role>>;

    /// Replace the principal's stamp with a fresh value in one atomic write
    /// and return the updated record.
    async fn rotate_stamp(&mut self, principal: &Principal) -> Result<Principal>;
}

/// Source of scoped store handles.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn scope(&self) -> Result<Box<dyn PrincipalStore>>;
}

/// Resolve a principal trying id, then username, then email. Empty
/// candidates are skipped and the first candidate that resolves wins.
///
/// # Errors
///
/// Propagates store failures.
pub async fn resolve_principal(
    store: &mut dyn PrincipalStore,
    identifiers: &Identifiers,
) -> Result<Option<Principal>> {
    if let Some(id) = non_empty(identifiers.id.as_deref()) {
        if let Some(principal) = store.find_by_id(id).await? {
            return Ok(Some(principal));
        }
    }
    if let Some(username) = non_empty(identifiers.username.as_deref()) {
        if let Some(principal) = store.find_by_username(username).await? {
            return Ok(Some(principal));
        }
    }
    if let Some(email) = non_empty(identifiers.email.as_deref()) {
        return store.find_by_email(email).await;
    }
    Ok(None)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Fresh opaque stamp value.
#[must_use]
pub fn new_stamp() -> String {
    uuid::Uuid::new_v4().to_string()
}
