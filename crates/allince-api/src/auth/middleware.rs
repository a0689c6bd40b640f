/// Per-request identity resolution and role-tier gates
///
/// `user_identity` runs on every API route. It turns the `Authorization`
/// header into an `Identity` stored in the request extensions:
///
/// - no header: anonymous identity (role 0), request proceeds
/// - header not exactly `Bearer <token>`: 400, no token parsing
/// - token rejected by `TokenService::parse_token`: 401, no identity stored
///
/// The gates `user_authorized` and `user_has_permission` read that identity
/// back. A missing identity means the route was mounted without
/// `user_identity` and is reported as an internal error.
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use allince_core::Identity;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

/// Why an `Authorization` header could not be read as a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthHeaderError {
    #[error("authorization header is not valid text")]
    NotText,

    #[error("authorization header must be 'Bearer <token>'")]
    Malformed,
}

/// Split an `Authorization` header value into its bearer token
///
/// Exactly two space-separated parts are accepted and the first must be
/// `Bearer`. The token part is returned as-is, even when empty.
pub fn parse_bearer(value: &HeaderValue) -> Result<&str, AuthHeaderError> {
    let value = value.to_str().map_err(|_| AuthHeaderError::NotText)?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(AuthHeaderError::Malformed),
    }
}

/// Role-tier predicate applied after identity resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Any non-anonymous identity
    Authorized,
    /// Elevated tiers only (role 2 and above)
    HasPermission,
}

impl Gate {
    pub fn name(self) -> &'static str {
        match self {
            Gate::Authorized => "user_authorized",
            Gate::HasPermission => "user_has_permission",
        }
    }

    /// Decide a request from the identity found in its extensions
    pub fn check(self, identity: Option<&Identity>) -> Result<Identity, AppError> {
        let identity = *identity.ok_or_else(missing_identity)?;
        match self {
            Gate::Authorized if identity.is_anonymous() => {
                Err(AppError::Unauthorized("user unauthorized".to_string()))
            }
            Gate::HasPermission if !identity.is_elevated() => {
                Err(AppError::Forbidden("permission denied".to_string()))
            }
            _ => Ok(identity),
        }
    }
}

fn missing_identity() -> AppError {
    AppError::Internal("identity missing from request context".to_string())
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Resolve the caller's identity from the bearer token
pub async fn user_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = match request.headers().get(header::AUTHORIZATION) {
        None => Identity::anonymous(),
        Some(value) => {
            let token = match parse_bearer(value) {
                Ok(token) => token,
                Err(e) => {
                    audit_log(&AuditEvent::MalformedAuthHeader {
                        ip_address: extract_ip_address(request.headers(), peer_addr(&request)),
                    });
                    return Err(AppError::BadRequest(e.to_string()));
                }
            };

            match state.tokens.parse_token(token) {
                Ok(identity) => identity,
                Err(e) => {
                    state.auth_counters.record_invalid_token();
                    audit_log(&AuditEvent::InvalidToken {
                        reason: e.to_string(),
                        ip_address: extract_ip_address(request.headers(), peer_addr(&request)),
                        user_agent: extract_user_agent(request.headers()),
                    });
                    return Err(e);
                }
            }
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn run_gate(
    gate: Gate,
    state: &AppState,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(e) = gate.check(request.extensions().get::<Identity>()) {
        if let Some(identity) = request.extensions().get::<Identity>() {
            state.auth_counters.record_gate_denial();
            audit_log(&AuditEvent::AccessDenied {
                user_id: identity.user_id,
                role_id: identity.role_id,
                resource: request.uri().path().to_string(),
                gate: gate.name().to_string(),
                ip_address: extract_ip_address(request.headers(), peer_addr(&request)),
            });
        }
        return Err(e);
    }

    Ok(next.run(request).await)
}

/// Reject anonymous callers with 401
pub async fn user_authorized(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    run_gate(Gate::Authorized, &state, request, next).await
}

/// Reject anonymous and standard callers with 403
pub async fn user_has_permission(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    run_gate(Gate::HasPermission, &state, request, next).await
}

/// Handler extractor for the identity written by `user_identity`
#[derive(Debug, Clone, Copy)]
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .map(CurrentIdentity)
            .ok_or_else(missing_identity)
    }
}
