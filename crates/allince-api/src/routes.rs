//! API route definitions

use crate::auth::{user_authorized, user_has_permission, user_identity};
use crate::handlers::auth;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
///
/// Identity resolution wraps the protected groups only, outside their gates.
/// Public routes never look at the `Authorization` header.
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Open to anonymous callers
    let public_routes = Router::new()
        .route("/auth/sign-up", post(auth::sign_up_handler))
        .route("/auth/sign-in", post(auth::sign_in_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Any authenticated caller
    let authorized_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            user_authorized,
        ));

    // Elevated tiers only
    let elevated_routes = Router::new()
        .route("/auth/moderators", post(auth::create_moderator_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            user_has_permission,
        ));

    let protected_routes = Router::new()
        .merge(authorized_routes)
        .merge(elevated_routes)
        .route_layer(middleware::from_fn_with_state(state, user_identity));

    Router::new().merge(public_routes).merge(protected_routes)
}
