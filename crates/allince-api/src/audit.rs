//! Security audit logging for authentication events
//!
//! Every event is logged at INFO level with the "audit" target, so account
//! creation, sign-in, refresh, logout and gate denials can be routed apart
//! from application logs.
//!
//! # Example
//!
//! ```ignore
//! use allince_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::SignInSuccess {
//!     user_id: 7,
//!     session_id: 12,
//!     email: "user@example.com".to_string(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: Some("Mozilla/5.0...".to_string()),
//! });
//! ```

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Account created by sign-up or the moderator route
    SignUpSuccess {
        user_id: i32,
        role_id: i32,
        email: String,
        ip_address: Option<String>,
    },

    /// Account creation rejected
    SignUpFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
    },

    /// Credentials accepted and a session opened
    SignInSuccess {
        user_id: i32,
        session_id: i32,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SignInFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// New access token minted from a live session
    TokenRefresh {
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Refresh token rejected by signature, session lookup or session state
    RefreshRejected {
        reason: String,
        ip_address: Option<String>,
    },

    /// Session deleted by refresh token
    Logout { ip_address: Option<String> },

    /// Gate rejected the request's role tier
    AccessDenied {
        user_id: i32,
        role_id: i32,
        resource: String,
        gate: String,
        ip_address: Option<String>,
    },

    /// Bearer token failed verification
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Authorization header was not `Bearer <token>`
    MalformedAuthHeader { ip_address: Option<String> },
}

impl AuditEvent {
    fn message(&self) -> &'static str {
        match self {
            AuditEvent::SignUpSuccess { .. } => "Account created",
            AuditEvent::SignUpFailure { .. } => "Account creation failed",
            AuditEvent::SignInSuccess { .. } => "Sign-in successful",
            AuditEvent::SignInFailure { .. } => "Sign-in failed",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::RefreshRejected { .. } => "Token refresh rejected",
            AuditEvent::Logout { .. } => "Session logout",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::MalformedAuthHeader { .. } => "Malformed authorization header",
        }
    }

    fn ip_address(&self) -> Option<&str> {
        match self {
            AuditEvent::SignUpSuccess { ip_address, .. }
            | AuditEvent::SignUpFailure { ip_address, .. }
            | AuditEvent::SignInSuccess { ip_address, .. }
            | AuditEvent::SignInFailure { ip_address, .. }
            | AuditEvent::TokenRefresh { ip_address, .. }
            | AuditEvent::RefreshRejected { ip_address, .. }
            | AuditEvent::Logout { ip_address }
            | AuditEvent::AccessDenied { ip_address, .. }
            | AuditEvent::InvalidToken { ip_address, .. }
            | AuditEvent::MalformedAuthHeader { ip_address } => ip_address.as_deref(),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The full event is serialized to JSON in the `event` field for log
/// aggregators; the variant-specific identifiers are repeated as their own
/// fields so they can be filtered on directly.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let ip_address = event.ip_address();
    let message = event.message();

    match event {
        AuditEvent::SignUpSuccess {
            user_id,
            role_id,
            email,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                role_id = %role_id,
                email = %email,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::SignInSuccess {
            user_id,
            session_id,
            email,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                session_id = %session_id,
                email = %email,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::SignUpFailure { email, reason, .. }
        | AuditEvent::SignInFailure { email, reason, .. } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            role_id,
            resource,
            gate,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                role_id = %role_id,
                resource = %resource,
                gate = %gate,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::RefreshRejected { reason, .. } | AuditEvent::InvalidToken { reason, .. } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                reason = %reason,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::TokenRefresh { .. }
        | AuditEvent::Logout { .. }
        | AuditEvent::MalformedAuthHeader { .. } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                "{message}"
            );
        }
    }
}

/// Extract the client IP address
///
/// Checks X-Forwarded-For (first entry), then X-Real-IP, then the socket
/// peer address when the server was started with connect info.
pub fn extract_ip_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.trim().to_string());
        }
    }

    peer.map(|addr| addr.ip().to_string())
}

/// Extract the User-Agent header
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
