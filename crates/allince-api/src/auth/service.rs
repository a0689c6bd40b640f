//! Authentication service layer
//!
//! `TokenService` issues and verifies tokens and manages refresh-token
//! sessions. `AccountService` creates user and moderator accounts.
//! Both depend only on the store capabilities they use.

use super::jwt::{
    generate_access_token, generate_refresh_token, validate_access_token, validate_refresh_token,
    JwtConfig,
};
use super::password::{hash_password_with_config, verify_password};
use super::validation::CredentialPolicy;
use crate::error::AppError;
use allince_core::{
    Identity, NewSession, NewUser, PasswordConfig, Session, SessionStore, StoreError, User,
    UserStore, ROLE_MODERATOR, ROLE_USER,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Account creation request, shared by users and moderators
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

/// Account creation response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedAccount {
    pub id: i32,
    pub role_id: i32,
}

/// Sign-in request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Sign-in response with both tokens and the new session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: i32,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Token refresh and logout request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token refresh response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Client metadata recorded on the session row
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

/// Tokens minted for one successful credential check
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: Identity,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Token issuance, verification and session management
#[derive(Clone)]
pub struct TokenService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    jwt_config: JwtConfig,
}

impl TokenService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        jwt_config: JwtConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            jwt_config,
        }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.jwt_config
    }

    /// Check an email/password pair and mint an access and a refresh token
    ///
    /// Unknown email and wrong password fail identically with `Unauthorized`.
    pub async fn generate_tokens(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = match self.users.find_by_email(email).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(invalid_credentials()),
            Err(e) => return Err(e.into()),
        };

        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {e}")))??;

        if !valid {
            return Err(invalid_credentials());
        }

        let identity = user.identity();
        let access = generate_access_token(&self.jwt_config, identity)?;
        let refresh = generate_refresh_token(&self.jwt_config)?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            identity,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Verify an access token and return the identity it carries
    pub fn parse_token(&self, access_token: &str) -> Result<Identity, AppError> {
        let claims = validate_access_token(&self.jwt_config, access_token)?;
        Ok(claims.identity()?)
    }

    /// Verify a refresh token's signature and expiry without touching the store
    pub fn parse_refresh_token(&self, refresh_token: &str) -> Result<(), AppError> {
        validate_refresh_token(&self.jwt_config, refresh_token)?;
        Ok(())
    }

    /// Persist the session backing a freshly issued refresh token
    pub async fn create_new_session(
        &self,
        tokens: &TokenPair,
        client: ClientInfo,
    ) -> Result<Session, AppError> {
        let session = self
            .sessions
            .create_session(NewSession {
                user_id: tokens.identity.user_id,
                role_id: tokens.identity.role_id,
                refresh_token: tokens.refresh_token.clone(),
                client_ip: client.ip,
                user_agent: client.user_agent,
                expires_at: tokens.refresh_expires_at,
            })
            .await
            .map_err(|e| AppError::Internal(format!("Unable to create new session: {e}")))?;

        Ok(session)
    }

    /// Sign in: check credentials, mint tokens and open a session
    pub async fn sign_in(
        &self,
        request: SignInRequest,
        client: ClientInfo,
    ) -> Result<(Identity, SignInResponse), AppError> {
        let tokens = self.generate_tokens(&request.email, &request.password).await?;
        let session = self.create_new_session(&tokens, client).await?;

        tracing::debug!(
            user_id = session.user_id,
            session_id = session.id,
            "Session opened"
        );

        Ok((
            session.identity(),
            SignInResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                session_id: session.id,
                refresh_expires_at: session.expires_at,
            },
        ))
    }

    /// Mint a new access token from a live session
    ///
    /// The refresh token must pass its own signature and expiry check, and a
    /// session row holding it must exist, be unblocked and unexpired. Refresh
    /// tokens are not rotated; they stay usable until logout or expiry.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AppError> {
        self.parse_refresh_token(refresh_token)?;

        let session = match self.sessions.get_by_refresh(refresh_token).await {
            Ok(session) => session,
            // Do not reveal whether the token ever existed
            Err(StoreError::NotFound(_)) => return Err(invalid_refresh_token()),
            Err(e) => return Err(e.into()),
        };

        if session.is_blocked {
            tracing::debug!(session_id = session.id, "Refresh on blocked session");
            return Err(invalid_refresh_token());
        }
        if !session.is_active() {
            tracing::debug!(session_id = session.id, "Refresh on expired session");
            return Err(invalid_refresh_token());
        }

        let access = generate_access_token(&self.jwt_config, session.identity())?;
        Ok(access.token)
    }

    /// Delete the session behind a refresh token
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        match self.sessions.delete_by_refresh(refresh_token).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(invalid_refresh_token()),
            Err(e) => Err(e.into()),
        }
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("invalid email or password".to_string())
}

fn invalid_refresh_token() -> AppError {
    AppError::Unauthorized("invalid refresh token".to_string())
}

/// Account creation for users and moderators
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    policy: CredentialPolicy,
    password_config: PasswordConfig,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        policy: CredentialPolicy,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            users,
            policy,
            password_config,
        }
    }

    /// Create a standard user account (role 1)
    pub async fn create_user(&self, request: SignUpRequest) -> Result<User, AppError> {
        self.create_account(request, ROLE_USER).await
    }

    /// Create a moderator account (role 2)
    pub async fn create_moderator(&self, request: SignUpRequest) -> Result<User, AppError> {
        self.create_account(request, ROLE_MODERATOR).await
    }

    async fn create_account(&self, request: SignUpRequest, role_id: i32) -> Result<User, AppError> {
        self.policy.validate(&request)?;

        let config = self.password_config.clone();
        let password = request.password;
        let password_hash =
            tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
                .await
                .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))??;

        let user = self
            .users
            .create_user(NewUser {
                role_id,
                name: request.name,
                email: request.email,
                password_hash,
                phone_number: request.phone_number,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => {
                    AppError::BadRequest("email already registered".to_string())
                }
                other => other.into(),
            })?;

        Ok(user)
    }
}
