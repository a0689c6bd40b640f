//! Allince API - authentication and session service
//!
//! HTTP endpoints for account creation, sign-in, token refresh and logout,
//! with per-request identity resolution and role-tier gates.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use handlers::{auth as auth_handlers, health};
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

/// OpenAPI document for the service
#[derive(OpenApi)]
#[openapi(
    info(title = "Allince API", description = "Authentication and session service"),
    paths(
        health::health_check,
        health::readiness_check,
        health::prometheus_metrics,
        auth_handlers::sign_up_handler,
        auth_handlers::create_moderator_handler,
        auth_handlers::sign_in_handler,
        auth_handlers::refresh_handler,
        auth_handlers::logout_handler,
        auth_handlers::me_handler,
    ),
    components(schemas(
        auth::SignUpRequest,
        auth::CreatedAccount,
        auth::SignInRequest,
        auth::SignInResponse,
        auth::RefreshRequest,
        auth::RefreshResponse,
        auth_handlers::LogoutResponse,
        auth_handlers::MeResponse,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks,
        error::ApiError,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Accounts, sessions and tokens"),
        (name = "health", description = "Liveness, readiness and metrics"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::prometheus_metrics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(any(test, feature = "test-utils"))]
mod testing {
    use super::*;
    use allince_core::{
        AppConfig, MemorySessionStore, MemoryUserStore, PasswordConfig, StorageBackend,
    };

    /// Fixed signing secret used by the test router
    pub const TEST_JWT_SECRET: &str = "allince-test-secret";

    /// State backed by in-memory stores with cheap Argon2 parameters
    pub fn create_test_state() -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
        config.auth.password = PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        };

        Arc::new(AppState::new(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemorySessionStore::new()),
        ))
    }

    /// Router over a fresh in-memory state
    pub fn create_router_for_testing() -> Router {
        create_router(create_test_state())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use testing::{create_router_for_testing, create_test_state, TEST_JWT_SECRET};
