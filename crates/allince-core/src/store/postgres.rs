//! PostgreSQL user and session stores
//!
//! Table names come from `DatabaseConfig` and are validated as plain SQL
//! identifiers before a store is built, so they are spliced into query text
//! while every value goes through bind parameters.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::{NewSession, NewUser, Result, Session, SessionStore, StoreError, User, UserStore};

const USER_COLUMNS: &str = "id, role_id, name, email, password_hash, phone_number";
const SESSION_COLUMNS: &str =
    "id, user_id, role_id, refresh_token, is_blocked, client_ip, user_agent, expires_at, created_at";

/// Open a connection pool
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.postgres_pool_size)
        .connect(&config.postgres_url)
        .await
        .map_err(|e| StoreError::Database(format!("PostgreSQL connection failed: {e}")))
}

/// Apply the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
}

/// Translate constraint violations into store errors
fn map_write_error(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(format!("{what} already exists"));
        }
        if db_err.is_check_violation() {
            return StoreError::InvalidRecord(db_err.message().to_string());
        }
    }
    StoreError::Database(format!("Failed to create {what}: {err}"))
}

/// PostgreSQL-backed credential store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    table: String,
}

impl PgUserStore {
    pub fn new(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            table: config.users_table.clone(),
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let query = format!(
            "INSERT INTO {} (role_id, name, email, password_hash, phone_number) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}",
            self.table
        );

        sqlx::query_as::<_, User>(&query)
            .bind(user.role_id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.phone_number)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "user"))
    }

    async fn find_by_email(&self, email: &str) -> Result<User> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM {} WHERE email = $1 LIMIT 1",
            self.table
        );

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to fetch user: {e}")))?
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

/// PostgreSQL-backed session store
///
/// Uniqueness of `refresh_token` is enforced by the table's unique
/// constraint; inserts and deletes are single statements.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    table: String,
}

impl PgSessionStore {
    pub fn new(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            table: config.sessions_table.clone(),
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, session: NewSession) -> Result<Session> {
        session.check(Utc::now())?;

        let query = format!(
            "INSERT INTO {} (user_id, role_id, refresh_token, client_ip, user_agent, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SESSION_COLUMNS}",
            self.table
        );

        let created = sqlx::query_as::<_, Session>(&query)
            .bind(session.user_id)
            .bind(session.role_id)
            .bind(&session.refresh_token)
            .bind(&session.client_ip)
            .bind(&session.user_agent)
            .bind(session.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "session"))?;

        tracing::debug!(session_id = created.id, user_id = created.user_id, "Session created");
        Ok(created)
    }

    async fn get_by_refresh(&self, refresh_token: &str) -> Result<Session> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM {} WHERE refresh_token = $1 LIMIT 1",
            self.table
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to fetch session: {e}")))?
            .ok_or_else(|| StoreError::NotFound("session".to_string()))
    }

    async fn delete_by_refresh(&self, refresh_token: &str) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE refresh_token = $1", self.table);

        let result = sqlx::query(&query)
            .bind(refresh_token)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to delete session: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("session".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
