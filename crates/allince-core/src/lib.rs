//! Allince Core - Identity, session and credential domain types
//!
//! This crate defines the core abstractions used by the auth service:
//! - Role tiers and the per-request `Identity`
//! - User and session records
//! - Storage capability traits (`UserStore`, `SessionStore`)
//! - PostgreSQL and in-memory store implementations
//! - Configuration management

pub mod config;
pub mod store;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, PasswordConfig,
    ServerConfig, StorageBackend, StorageConfig,
};
pub use store::{MemorySessionStore, MemoryUserStore, PgSessionStore, PgUserStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors returned by user and session stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Role Tiers
// ============================================================================

/// No credentials were presented
pub const ROLE_ANONYMOUS: i32 = 0;

/// Standard authenticated user
pub const ROLE_USER: i32 = 1;

/// Moderator, the lowest elevated tier
pub const ROLE_MODERATOR: i32 = 2;

/// Identity resolved for a single request
///
/// Derived from a verified access token, or `Identity::anonymous()` when the
/// request carried no credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i32,
    pub role_id: i32,
}

impl Identity {
    pub fn new(user_id: i32, role_id: i32) -> Self {
        Self { user_id, role_id }
    }

    /// The `{0, 0}` identity of a request without credentials
    pub fn anonymous() -> Self {
        Self::new(0, ROLE_ANONYMOUS)
    }

    pub fn is_anonymous(&self) -> bool {
        self.role_id == ROLE_ANONYMOUS
    }

    /// Whether the role tier is above a plain user.
    ///
    /// Only tiers 0 and 1 are excluded; every other value counts as elevated.
    pub fn is_elevated(&self) -> bool {
        !matches!(self.role_id, ROLE_ANONYMOUS | ROLE_USER)
    }
}

// ============================================================================
// Users
// ============================================================================

/// Stored user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub role_id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone_number: String,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.role_id)
    }
}

/// User account awaiting insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub role_id: i32,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, never the plaintext password
    pub password_hash: String,
    pub phone_number: String,
}

// ============================================================================
// Sessions
// ============================================================================

/// Server-side record backing one issued refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i32,
    pub user_id: i32,
    /// Role snapshot taken at sign-in
    pub role_id: i32,
    pub refresh_token: String,
    pub is_blocked: bool,
    pub client_ip: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id, self.role_id)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A session can mint access tokens while it is neither blocked nor expired
    pub fn is_active(&self) -> bool {
        !self.is_blocked && !self.is_expired_at(Utc::now())
    }
}

/// Session awaiting insertion; the store assigns `id`, `is_blocked` and `created_at`
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i32,
    pub role_id: i32,
    pub refresh_token: String,
    pub client_ip: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
}

impl NewSession {
    /// Reject rows that would break `expires_at > created_at` or carry no token
    pub fn check(&self, now: DateTime<Utc>) -> Result<()> {
        if self.refresh_token.is_empty() {
            return Err(StoreError::InvalidRecord(
                "refresh token must not be empty".to_string(),
            ));
        }
        if self.expires_at <= now {
            return Err(StoreError::InvalidRecord(format!(
                "session expiry {} is not after creation time {}",
                self.expires_at, now
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Credential store keyed by email
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; a taken email is `StoreError::Conflict`
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Exact-match lookup by email
    async fn find_by_email(&self, email: &str) -> Result<User>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Session store keyed by refresh token
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session and return the full stored row
    async fn create_session(&self, session: NewSession) -> Result<Session>;

    /// Look up the single session holding `refresh_token`
    async fn get_by_refresh(&self, refresh_token: &str) -> Result<Session>;

    /// Delete the session holding `refresh_token`; `NotFound` if nothing was deleted
    async fn delete_by_refresh(&self, refresh_token: &str) -> Result<()>;

    /// Store name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_session(expires_at: DateTime<Utc>) -> NewSession {
        NewSession {
            user_id: 7,
            role_id: ROLE_USER,
            refresh_token: "token".to_string(),
            client_ip: "127.0.0.1".to_string(),
            user_agent: "test".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous();
        assert_eq!(identity, Identity::new(0, 0));
        assert!(identity.is_anonymous());
        assert!(!identity.is_elevated());
    }

    #[test]
    fn test_role_tiers() {
        let user = Identity::new(1, ROLE_USER);
        assert!(!user.is_anonymous());
        assert!(!user.is_elevated());

        let moderator = Identity::new(2, ROLE_MODERATOR);
        assert!(moderator.is_elevated());

        let admin = Identity::new(3, 5);
        assert!(admin.is_elevated());
    }

    #[test]
    fn test_new_session_check() {
        let now = Utc::now();
        assert!(new_session(now + Duration::hours(1)).check(now).is_ok());
        assert!(matches!(
            new_session(now).check(now),
            Err(StoreError::InvalidRecord(_))
        ));

        let mut empty = new_session(now + Duration::hours(1));
        empty.refresh_token.clear();
        assert!(matches!(empty.check(now), Err(StoreError::InvalidRecord(_))));
    }

    #[test]
    fn test_session_activity() {
        let now = Utc::now();
        let mut session = Session {
            id: 1,
            user_id: 7,
            role_id: ROLE_USER,
            refresh_token: "token".to_string(),
            is_blocked: false,
            client_ip: String::new(),
            user_agent: String::new(),
            expires_at: now + Duration::hours(1),
            created_at: now,
        };
        assert!(session.is_active());
        assert_eq!(session.identity(), Identity::new(7, ROLE_USER));

        session.is_blocked = true;
        assert!(!session.is_active());

        session.is_blocked = false;
        session.expires_at = now - Duration::seconds(1);
        assert!(!session.is_active());
    }
}
