//! PostgreSQL principal store.
//!
//! Each scope holds one pooled connection; dropping the handle returns it to
//! the pool. Stamp rotation is a single `UPDATE ... RETURNING`, so concurrent
//! rotations for the same principal resolve to whichever write lands last.
//! Schema lives in `sql/schema.sql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    pool::PoolConnection,
    postgres::{PgPoolOptions, PgRow},
    PgPool, Postgres, Row,
};
use std::time::Duration;
use tracing::{debug, Instrument};

use super::store::{new_stamp, Principal, PrincipalStore, Role, StoreProvider};

const SELECT_BY_ID: &str =
    "SELECT id, username, email, password_hash, stamp FROM principals WHERE id = $1";
const SELECT_BY_USERNAME: &str =
    "SELECT id, username, email, password_hash, stamp FROM principals WHERE username = $1";
const SELECT_BY_EMAIL: &str =
    "SELECT id, username, email, password_hash, stamp FROM principals WHERE lower(email) = lower($1)";
const SELECT_ROLES: &str =
    "SELECT name FROM principal_roles WHERE principal_id = $1 ORDER BY name";
const ROTATE_STAMP: &str = r"
    UPDATE principals
    SET stamp = $2
    WHERE id = $1
    RETURNING id, username, email, password_hash, stamp
";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool to `dsn`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connection fails.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreProvider for PgStore {
    async fn scope(&self) -> Result<Box<dyn PrincipalStore>> {
        let span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let conn = self
            .pool
            .acquire()
            .instrument(span)
            .await
            .context("failed to acquire database connection")?;
        Ok(Box::new(PgHandle { conn }))
    }
}

struct PgHandle {
    conn: PoolConnection<Postgres>,
}

impl PgHandle {
    async fn fetch_principal(&mut self, query: &'static str, key: &str) -> Result<Option<Principal>> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&mut *self.conn)
            .instrument(span)
            .await
            .context("failed to lookup principal")?;
        row.as_ref().map(principal_from_row).transpose()
    }
}

#[async_trait]
impl PrincipalStore for PgHandle {
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Principal>> {
        self.fetch_principal(SELECT_BY_ID, id).await
    }

    async fn find_by_username(&mut self, username: &str) -> Result<Option<Principal>> {
        self.fetch_principal(SELECT_BY_USERNAME, username).await
    }

    async fn find_by_email(&mut self, email: &str) -> Result<Option<Principal>> {
        self.fetch_principal(SELECT_BY_EMAIL, email).await
    }

    async fn roles(&mut self, principal: &Principal) -> Result<Vec<Role>> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = SELECT_ROLES
        );
        let rows = sqlx::query(SELECT_ROLES)
            .bind(&principal.id)
            .fetch_all(&mut *self.conn)
            .instrument(span)
            .await
            .context("failed to load roles")?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name")
                    .map(Role::new)
                    .context("invalid role row")
            })
            .collect()
    }

    async fn rotate_stamp(&mut self, principal: &Principal) -> Result<Principal> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = ROTATE_STAMP
        );
        let row = sqlx::query(ROTATE_STAMP)
            .bind(&principal.id)
            .bind(new_stamp())
            .fetch_optional(&mut *self.conn)
            .instrument(span)
            .await
            .context("failed to rotate stamp")?
            .with_context(|| format!("principal {} disappeared during rotation", principal.id))?;
        debug!("Stamp rotated in database for {}", principal.id);
        principal_from_row(&row)
    }
}

fn principal_from_row(row: &PgRow) -> Result<Principal> {
    Ok(Principal {
        id: row.try_get("id").context("invalid principal id")?,
        username: row.try_get("username").context("invalid username")?,
        email: row.try_get("email").context("invalid email")?,
        password_hash: row.try_get("password_hash").context("invalid password hash")?,
        stamp: row.try_get("stamp").context("invalid stamp")?,
    })
}
