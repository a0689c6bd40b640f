//! In-memory user and session stores
//!
//! Process-local implementations of `UserStore` and `SessionStore` for tests
//! and single-node development. They enforce the same uniqueness rules as the
//! PostgreSQL schema: one user per email, one session per refresh token.
//! Data is lost when the store is dropped.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{NewSession, NewUser, Result, Session, SessionStore, StoreError, User, UserStore};

#[derive(Debug, Default)]
struct UserTable {
    last_id: i32,
    by_email: HashMap<String, User>,
}

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<UserTable>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.by_email.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut table = self.users.write().await;
        if table.by_email.contains_key(&user.email) {
            return Err(StoreError::Conflict("user already exists".to_string()));
        }

        table.last_id += 1;
        let created = User {
            id: table.last_id,
            role_id: user.role_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            phone_number: user.phone_number,
        };
        table.by_email.insert(created.email.clone(), created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<User> {
        self.users
            .read()
            .await
            .by_email
            .get(email)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Default)]
struct SessionTable {
    last_id: i32,
    by_refresh: HashMap<String, Session>,
}

/// In-memory session store keyed by refresh token
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<SessionTable>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live session rows
    pub async fn len(&self) -> usize {
        self.sessions.read().await.by_refresh.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Mark the session holding `refresh_token` as blocked.
    ///
    /// Blocking happens outside the HTTP surface (operator action on the
    /// sessions table); this mirrors it for tests.
    pub async fn block(&self, refresh_token: &str) -> Result<()> {
        let mut table = self.sessions.write().await;
        let session = table
            .by_refresh
            .get_mut(refresh_token)
            .ok_or_else(|| StoreError::NotFound("session".to_string()))?;
        session.is_blocked = true;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, session: NewSession) -> Result<Session> {
        let now = Utc::now();
        session.check(now)?;

        let mut table = self.sessions.write().await;
        if table.by_refresh.contains_key(&session.refresh_token) {
            return Err(StoreError::Conflict("session already exists".to_string()));
        }

        table.last_id += 1;
        let created = Session {
            id: table.last_id,
            user_id: session.user_id,
            role_id: session.role_id,
            refresh_token: session.refresh_token,
            is_blocked: false,
            client_ip: session.client_ip,
            user_agent: session.user_agent,
            expires_at: session.expires_at,
            created_at: now,
        };
        table
            .by_refresh
            .insert(created.refresh_token.clone(), created.clone());

        tracing::debug!(session_id = created.id, user_id = created.user_id, "Session created");
        Ok(created)
    }

    async fn get_by_refresh(&self, refresh_token: &str) -> Result<Session> {
        self.sessions
            .read()
            .await
            .by_refresh
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("session".to_string()))
    }

    async fn delete_by_refresh(&self, refresh_token: &str) -> Result<()> {
        self.sessions
            .write()
            .await
            .by_refresh
            .remove(refresh_token)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("session".to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
