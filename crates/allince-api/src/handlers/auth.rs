//! Authentication API handlers
//!
//! Account creation, sign-in, refresh, logout and the caller's identity.
//!
//! Request bodies are taken as `Result<Json<_>, JsonRejection>` so malformed
//! JSON comes back as a 400 with the standard error body.

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{
    ClientInfo, CreatedAccount, CurrentIdentity, RefreshRequest, RefreshResponse, SignInRequest,
    SignUpRequest,
};
use crate::error::AppError;
use crate::state::AppState;
use allince_core::User;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use utoipa::ToSchema;

/// Logout response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub message: String,
}

/// The caller's resolved identity
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: i32,
    pub role_id: i32,
}

fn client_ip(headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> Option<String> {
    extract_ip_address(headers, peer.map(|ConnectInfo(addr)| addr))
}

fn created(
    result: Result<User, AppError>,
    email: String,
    ip_address: Option<String>,
) -> Result<(StatusCode, Json<CreatedAccount>), AppError> {
    match result {
        Ok(user) => {
            audit_log(&AuditEvent::SignUpSuccess {
                user_id: user.id,
                role_id: user.role_id,
                email: user.email,
                ip_address,
            });
            Ok((
                StatusCode::CREATED,
                Json(CreatedAccount {
                    id: user.id,
                    role_id: user.role_id,
                }),
            ))
        }
        Err(e) => {
            audit_log(&AuditEvent::SignUpFailure {
                email,
                reason: e.to_string(),
                ip_address,
            });
            Err(e)
        }
    }
}

/// Create a standard user account
///
/// The account is assigned role 1. Email shape, password length (4+) and
/// phone number length (10+) are checked before anything is stored.
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign-up",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = CreatedAccount),
        (status = 400, description = "Invalid input or email already registered", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn sign_up_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let email = request.email.clone();

    let result = state.accounts.create_user(request).await;
    created(result, email, client_ip(&headers, peer))
}

/// Create a moderator account
///
/// Same input rules as sign-up; the account is assigned role 2. Only
/// elevated callers pass the gate on this route.
#[utoipa::path(
    post,
    path = "/api/v1/auth/moderators",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Moderator account created", body = CreatedAccount),
        (status = 400, description = "Invalid input or email already registered", body = crate::error::ApiError),
        (status = 401, description = "Invalid bearer token", body = crate::error::ApiError),
        (status = 403, description = "Caller is not elevated", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_moderator_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let email = request.email.clone();

    let result = state.accounts.create_moderator(request).await;
    created(result, email, client_ip(&headers, peer))
}

/// Sign in with email and password
///
/// Returns an access token, a refresh token and the session opened for it.
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign-in",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = crate::auth::SignInResponse),
        (status = 400, description = "Malformed body", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let email = request.email.clone();
    let ip_address = client_ip(&headers, peer);
    let user_agent = extract_user_agent(&headers);

    let client = ClientInfo {
        ip: ip_address.clone().unwrap_or_default(),
        user_agent: user_agent.clone().unwrap_or_default(),
    };

    match state.tokens.sign_in(request, client).await {
        Ok((identity, response)) => {
            state.auth_counters.record_sign_in();
            audit_log(&AuditEvent::SignInSuccess {
                user_id: identity.user_id,
                session_id: response.session_id,
                email,
                ip_address,
                user_agent,
            });
            Ok(Json(response))
        }
        Err(e) => {
            audit_log(&AuditEvent::SignInFailure {
                email,
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            Err(e)
        }
    }
}

/// Exchange a refresh token for a new access token
///
/// The refresh token must verify on its own and map to an unblocked,
/// unexpired session. It is not rotated and stays usable until logout.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token minted", body = RefreshResponse),
        (status = 400, description = "Malformed body", body = crate::error::ApiError),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let ip_address = client_ip(&headers, peer);

    match state.tokens.refresh_access_token(&request.refresh_token).await {
        Ok(access_token) => {
            state.auth_counters.record_refresh();
            audit_log(&AuditEvent::TokenRefresh {
                ip_address,
                user_agent: extract_user_agent(&headers),
            });
            Ok(Json(RefreshResponse { access_token }))
        }
        Err(e) => {
            audit_log(&AuditEvent::RefreshRejected {
                reason: e.to_string(),
                ip_address,
            });
            Err(e)
        }
    }
}

/// Delete the session behind a refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session deleted", body = LogoutResponse),
        (status = 400, description = "Malformed body", body = crate::error::ApiError),
        (status = 401, description = "Unknown refresh token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;

    state.tokens.logout(&request.refresh_token).await?;
    audit_log(&AuditEvent::Logout {
        ip_address: client_ip(&headers, peer),
    });

    Ok(Json(LogoutResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Identity of the authenticated caller
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Caller identity", body = MeResponse),
        (status = 400, description = "Malformed authorization header", body = crate::error::ApiError),
        (status = 401, description = "Anonymous or invalid token", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(CurrentIdentity(identity): CurrentIdentity) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: identity.user_id,
        role_id: identity.role_id,
    })
}
