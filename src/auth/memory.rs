//! In-process principal store seeded from JSON.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::{path::Path, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{new_stamp, Principal, PrincipalStore, Role, StoreProvider};

/// Seed file entry.
#[derive(Clone, Debug, Deserialize)]
pub struct SeedPrincipal {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub stamp: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl SeedPrincipal {
    #[must_use]
    pub fn new(id: &str, username: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: None,
            stamp: None,
            roles: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    #[must_use]
    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = Some(stamp.into());
        self
    }

    #[must_use]
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(ToString::to_string).collect();
        self
    }
}

#[derive(Debug, Default)]
struct Records {
    entries: Vec<(Principal, Vec<Role>)>,
}

impl Records {
    fn find(&self, pred: impl Fn(&Principal) -> bool) -> Option<Principal> {
        self.entries
            .iter()
            .find(|(principal, _)| pred(principal))
            .map(|(principal, _)| principal.clone())
    }
}

/// Principal store backed by process memory. Clones share the same records.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Records>>,
}

impl MemoryStore {
    #[must_use]
    pub fn from_seed(seed: Vec<SeedPrincipal>) -> Self {
        let entries = seed
            .into_iter()
            .map(|s| {
                let roles = s.roles.into_iter().map(Role::new).collect();
                let principal = Principal {
                    id: s.id,
                    username: s.username,
                    email: s.email,
                    password_hash: s.password_hash,
                    stamp: s.stamp,
                };
                (principal, roles)
            })
            .collect();
        Self {
            records: Arc::new(RwLock::new(Records { entries })),
        }
    }

    /// Parse a JSON array of [`SeedPrincipal`].
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or ids are duplicated.
    pub fn from_json(json: &str) -> Result<Self> {
        let seed: Vec<SeedPrincipal> =
            serde_json::from_str(json).context("invalid principal seed")?;
        let mut ids: Vec<&str> = seed.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(anyhow!("duplicate principal id in seed: {}", pair[0]));
        }
        Ok(Self::from_seed(seed))
    }

    /// Load a seed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let store = Self::from_json(&json)?;
        debug!("Loaded principal seed from {}", path.display());
        Ok(store)
    }

    /// Current record for `id`, bypassing the scoped handle.
    pub async fn principal(&self, id: &str) -> Option<Principal> {
        self.records.read().await.find(|p| p.id == id)
    }

    /// Overwrite a stamp, as a password change elsewhere would.
    pub async fn set_stamp(&self, id: &str, stamp: Option<String>) -> bool {
        let mut records = self.records.write().await;
        match records.entries.iter_mut().find(|(p, _)| p.id == id) {
            Some((principal, _)) => {
                principal.stamp = stamp;
                true
            }
            None => false,
        }
    }

    /// Remove a principal, as an account deletion would.
    pub async fn remove(&self, id: &str) -> bool {
        let mut records = self.records.write().await;
        let before = records.entries.len();
        records.entries.retain(|(p, _)| p.id != id);
        records.entries.len() != before
    }
}

#[async_trait]
impl StoreProvider for MemoryStore {
    async fn scope(&self) -> Result<Box<dyn PrincipalStore>> {
        Ok(Box::new(MemoryHandle {
            records: Arc::clone(&self.records),
        }))
    }
}

struct MemoryHandle {
    records: Arc<RwLock<Records>>,
}

#[async_trait]
impl PrincipalStore for MemoryHandle {
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Principal>> {
        Ok(self.records.read().await.find(|p| p.id == id))
    }

    async fn find_by_username(&mut self, username: &str) -> Result<Option<Principal>> {
        Ok(self.records.read().await.find(|p| p.username == username))
    }

    async fn find_by_email(&mut self, email: &str) -> Result<Option<Principal>> {
        Ok(self
            .records
            .read()
            .await
            .find(|p| p.email.eq_ignore_ascii_case(email)))
    }

    async fn roles(&mut self, principal: &Principal) -> Result<Vec<Role>> {
        Ok(self
            .records
            .read()
            .await
            .entries
            .iter()
            .find(|(p, _)| p.id == principal.id)
            .map(|(_, roles)| roles.clone())
            .unwrap_or_default())
    }

    async fn rotate_stamp(&mut self, principal: &Principal) -> Result<Principal> {
        let mut records = self.records.write().await;
        let (record, _) = records
            .entries
            .iter_mut()
            .find(|(p, _)| p.id == principal.id)
            .ok_or_else(|| anyhow!("principal {} vanished during rotation", principal.id))?;
        record.stamp = Some(new_stamp());
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"[
        {"id": "1", "username": "alice", "email": "Alice@Tessera.dev",
         "password_hash": "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA",
         "stamp": "abc12345", "roles": ["admin", "user"]},
        {"id": "2", "username": "bob", "email": "bob@tessera.dev"}
    ]"#;

    #[tokio::test]
    async fn loads_seed_json() -> Result<()> {
        let store = MemoryStore::from_json(SEED)?;
        let mut handle = store.scope().await?;
        let alice = handle.find_by_username("alice").await?;
        assert_eq!(alice.as_ref().map(|p| p.id.as_str()), Some("1"));
        let roles = handle
            .roles(&alice.ok_or_else(|| anyhow!("alice missing"))?)
            .await?;
        assert_eq!(roles, vec![Role::new("admin"), Role::new("user")]);
        Ok(())
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() -> Result<()> {
        let store = MemoryStore::from_json(SEED)?;
        let mut handle = store.scope().await?;
        assert!(handle.find_by_email("alice@tessera.dev").await?.is_some());
        Ok(())
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = MemoryStore::from_json(
            r#"[{"id": "1", "username": "a", "email": "a@x.y"},
                {"id": "1", "username": "b", "email": "b@x.y"}]"#,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rotate_stamp_replaces_value() -> Result<()> {
        let store = MemoryStore::from_json(SEED)?;
        let mut handle = store.scope().await?;
        let before = handle
            .find_by_id("1")
            .await?
            .ok_or_else(|| anyhow!("missing"))?;
        let after = handle.rotate_stamp(&before).await?;
        assert_ne!(after.stamp, before.stamp);
        assert_eq!(store.principal("1").await.and_then(|p| p.stamp), after.stamp);
        Ok(())
    }

    #[tokio::test]
    async fn rotate_stamp_fails_for_removed_principal() -> Result<()> {
        let store = MemoryStore::from_json(SEED)?;
        let mut handle = store.scope().await?;
        let bob = handle
            .find_by_id("2")
            .await?
            .ok_or_else(|| anyhow!("missing"))?;
        assert!(store.remove("2").await);
        assert!(handle.rotate_stamp(&bob).await.is_err());
        Ok(())
    }
}
