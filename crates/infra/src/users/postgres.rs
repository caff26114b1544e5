//! Postgres-backed user store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | UserStoreError |
//! |------------|----------------|
//! | `Database` with code `3D000` (unknown database) | `MissingBackend` |
//! | `Database` (other) | `Storage` |
//! | `PoolClosed` | `Storage` |
//! | Other (I/O, TLS, decode) | `Storage` |
//!
//! "Not found" and "delete of missing" are derived from query results, never
//! from driver errors.
//!
//! ## Concurrency
//!
//! `save` is a single `INSERT .. ON CONFLICT DO UPDATE`, so concurrent saves
//! of one username resolve as last-writer-wins inside the database.

use std::sync::Arc;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use turnstile_core::{StoreResult, UserRecord, UserStore, UserStoreError};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    /// Wrap an existing pool. The caller is responsible for the schema; see
    /// [`Self::ensure_schema`].
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and create the `turnstile_users` table if it is missing.
    #[instrument(skip_all, err)]
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turnstile_users (
                username      TEXT PRIMARY KEY,
                email         TEXT NOT NULL,
                password_hash BYTEA NOT NULL,
                role          TEXT NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> StoreResult<UserRecord> {
    let decode = |e: sqlx::Error| UserStoreError::storage(format!("failed to decode user row: {e}"));
    Ok(UserRecord {
        username: row.try_get("username").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        role: row.try_get("role").map_err(decode)?,
    })
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self), err(level = "debug"))]
    async fn get(&self, username: &str) -> StoreResult<UserRecord> {
        let row = sqlx::query(
            r#"
            SELECT username, email, password_hash, role
            FROM turnstile_users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        match row {
            Some(row) => user_from_row(&row),
            None => Err(UserStoreError::NotFound(username.to_string())),
        }
    }

    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn save(&self, user: UserRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO turnstile_users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username)
            DO UPDATE SET
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                role = EXCLUDED.role
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_count = tracing::field::Empty), err)]
    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT username, email, password_hash, role
            FROM turnstile_users
            ORDER BY username ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        Span::current().record("user_count", rows.len());
        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self), err(level = "debug"))]
    async fn delete(&self, username: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM turnstile_users WHERE username = $1")
            .bind(username)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::DeleteOfMissing(username.to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> UserStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // invalid_catalog_name: the configured database does not exist
                Some("3D000") => UserStoreError::MissingBackend(msg),
                _ => UserStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            UserStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => UserStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
