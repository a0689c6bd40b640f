//! API Integration Tests
//!
//! Drive the full router over in-memory stores.

use allince_api::auth::jwt::{
    generate_access_token, generate_refresh_token, AccessClaims, JwtConfig, TokenKind,
};
use allince_api::auth::SignUpRequest;
use allince_api::{create_router, create_router_for_testing, create_test_state, TEST_JWT_SECRET};
use allince_core::{Identity, MemorySessionStore, MemoryUserStore, PasswordConfig};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn with_auth(mut request: Request<Body>, value: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, value.parse().unwrap());
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn sign_up_body(email: &str) -> Value {
    json!({
        "name": "A",
        "email": email,
        "password": "abcd",
        "phone_number": "1234567890"
    })
}

async fn sign_up(app: &Router, email: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request("POST", "/api/v1/auth/sign-up", Some(sign_up_body(email))),
    )
    .await
}

async fn sign_in(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/sign-in",
            Some(json!({ "email": email, "password": password })),
        ),
    )
    .await
}

fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        ..Default::default()
    }
}

fn bearer_for(identity: Identity) -> String {
    let issued = generate_access_token(&test_jwt_config(), identity).unwrap();
    format!("Bearer {}", issued.token)
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let state = create_test_state();
    let app = create_router(state.clone());

    let (status, json) = send(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["session_store"], "memory");

    state.set_ready(false);
    let (status, json) = send(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["ready"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_router_for_testing();
    sign_up(&app, "a@b.com").await;
    sign_in(&app, "a@b.com", "abcd").await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("allince_uptime_seconds"));
    assert!(text.contains("allince_sign_ins_total 1"));
    assert!(text.contains(
        "allince_http_requests_total{endpoint=\"/api/v1/auth/sign-up\",status=\"201\"} 1"
    ));
}

#[tokio::test]
async fn test_unknown_paths_share_one_metrics_series() {
    let state = create_test_state();
    let app = create_router(state.clone());

    send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    let before = state.metrics.read().await.len();

    for i in 0..50 {
        let (status, _) = send(
            &app,
            Request::builder()
                .uri(format!("/nope-{i}x"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let metrics = state.metrics.read().await;
    assert_eq!(metrics.len(), before + 1);
    assert_eq!(metrics["unmatched"].status_counts[&404], 50);
    assert!(metrics.contains_key("/health"));
}

#[tokio::test]
async fn test_openapi_document() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/auth/sign-in"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());

    let sign_in_ok = &json["paths"]["/api/v1/auth/sign-in"]["post"]["responses"]["200"];
    assert_eq!(
        sign_in_ok["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/SignInResponse"
    );
    assert!(json["components"]["schemas"]["SignInResponse"].is_object());
}

// =============================================================================
// Account Creation Tests
// =============================================================================

#[tokio::test]
async fn test_sign_up_assigns_default_tier() {
    let app = create_router_for_testing();

    let (status, json) = sign_up(&app, "a@b.com").await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["id"].is_i64());
    assert_eq!(json["role_id"], 1);
}

#[tokio::test]
async fn test_sign_up_invalid_email_creates_nothing() {
    let users = Arc::new(MemoryUserStore::new());
    let state = Arc::new(allince_api::state::AppState::new(
        light_config(),
        users.clone(),
        Arc::new(MemorySessionStore::new()),
    ));
    let app = create_router(state);

    let (status, json) = sign_up(&app, "not-an-email").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["message"], "invalid email");
    assert!(users.is_empty().await);
}

#[tokio::test]
async fn test_sign_up_short_fields() {
    let app = create_router_for_testing();

    let mut body = sign_up_body("a@b.com");
    body["password"] = json!("abc");
    let (status, json) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/sign-up", Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "password must be at least 4 characters");

    let mut body = sign_up_body("a@b.com");
    body["phone_number"] = json!("123456789");
    let (status, json) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/sign-up", Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "phone_number must be at least 10 characters");
}

#[tokio::test]
async fn test_sign_up_duplicate_email() {
    let app = create_router_for_testing();

    assert_eq!(sign_up(&app, "a@b.com").await.0, StatusCode::CREATED);
    let (status, json) = sign_up(&app, "a@b.com").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "email already registered");
}

#[tokio::test]
async fn test_sign_up_malformed_json() {
    let app = create_router_for_testing();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/sign-up")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

// =============================================================================
// Sign-in, Refresh and Logout Tests
// =============================================================================

#[tokio::test]
async fn test_sign_in_returns_tokens_and_session() {
    let app = create_router_for_testing();
    sign_up(&app, "a@b.com").await;

    let (status, json) = sign_in(&app, "a@b.com", "abcd").await;

    assert_eq!(status, StatusCode::OK);
    assert!(!json["access_token"].as_str().unwrap().is_empty());
    assert!(!json["refresh_token"].as_str().unwrap().is_empty());
    assert!(json["session_id"].is_i64());

    let expires_at: DateTime<Utc> = json["refresh_expires_at"].as_str().unwrap().parse().unwrap();
    let expected = Utc::now() + Duration::hours(1440);
    assert!((expires_at - expected).num_seconds().abs() < 60);
}

#[tokio::test]
async fn test_sign_in_access_token_resolves_identity() {
    let app = create_router_for_testing();
    let (_, created) = sign_up(&app, "a@b.com").await;
    let (_, tokens) = sign_in(&app, "a@b.com", "abcd").await;

    let request = with_auth(
        create_json_request("GET", "/api/v1/auth/me", None),
        &format!("Bearer {}", tokens["access_token"].as_str().unwrap()),
    );
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], created["id"]);
    assert_eq!(json["role_id"], 1);
}

#[tokio::test]
async fn test_sign_in_bad_credentials() {
    let app = create_router_for_testing();
    sign_up(&app, "a@b.com").await;

    let (wrong_password, wrong_json) = sign_in(&app, "a@b.com", "abce").await;
    let (unknown_email, unknown_json) = sign_in(&app, "x@b.com", "abcd").await;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_json["message"], unknown_json["message"]);
}

#[tokio::test]
async fn test_refresh_issues_access_token() {
    let app = create_router_for_testing();
    sign_up(&app, "a@b.com").await;
    let (_, tokens) = sign_in(&app, "a@b.com", "abcd").await;

    let refresh = json!({ "refresh_token": tokens["refresh_token"] });
    let (status, json) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/refresh", Some(refresh.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let request = with_auth(
        create_json_request("GET", "/api/v1/auth/me", None),
        &format!("Bearer {}", json["access_token"].as_str().unwrap()),
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    // Not rotated
    let (status, _) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/refresh", Some(refresh)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_with_garbage_token() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": "not-a-token" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json.get("access_token").is_none());
}

#[tokio::test]
async fn test_refresh_without_session() {
    let app = create_router_for_testing();
    let orphan = generate_refresh_token(&test_jwt_config()).unwrap();

    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": orphan.token })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_then_refresh_fails() {
    let app = create_router_for_testing();
    sign_up(&app, "a@b.com").await;
    let (_, tokens) = sign_in(&app, "a@b.com", "abcd").await;
    let refresh = json!({ "refresh_token": tokens["refresh_token"] });

    let (status, json) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/logout", Some(refresh.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].is_string());

    let (status, _) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/refresh", Some(refresh.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/logout", Some(refresh)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Identity and Gate Tests
// =============================================================================

#[tokio::test]
async fn test_anonymous_fails_both_gates() {
    let app = create_router_for_testing();

    let (status, _) = send(&app, create_json_request("GET", "/api/v1/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/moderators",
            Some(sign_up_body("m@b.com")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_standard_user_passes_authorized_only() {
    let app = create_router_for_testing();
    let bearer = bearer_for(Identity::new(1, 1));

    let (status, _) = send(
        &app,
        with_auth(create_json_request("GET", "/api/v1/auth/me", None), &bearer),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &app,
        with_auth(
            create_json_request(
                "POST",
                "/api/v1/auth/moderators",
                Some(sign_up_body("m@b.com")),
            ),
            &bearer,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_elevated_user_creates_moderator() {
    let state = create_test_state();
    let seeded = state
        .accounts
        .create_moderator(SignUpRequest {
            name: "Root".to_string(),
            email: "root@b.com".to_string(),
            password: "rootpass".to_string(),
            phone_number: "1234567890".to_string(),
        })
        .await
        .unwrap();
    let app = create_router(state);

    let (_, tokens) = sign_in(&app, "root@b.com", "rootpass").await;
    let bearer = format!("Bearer {}", tokens["access_token"].as_str().unwrap());

    let (status, json) = send(
        &app,
        with_auth(create_json_request("GET", "/api/v1/auth/me", None), &bearer),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], seeded.id);
    assert_eq!(json["role_id"], 2);

    let (status, json) = send(
        &app,
        with_auth(
            create_json_request(
                "POST",
                "/api/v1/auth/moderators",
                Some(sign_up_body("m@b.com")),
            ),
            &bearer,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["role_id"], 2);

    // Validation applies to moderators too
    let (status, _) = send(
        &app,
        with_auth(
            create_json_request(
                "POST",
                "/api/v1/auth/moderators",
                Some(sign_up_body("not-an-email")),
            ),
            &bearer,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_authorization_header() {
    let app = create_router_for_testing();
    let token = generate_access_token(&test_jwt_config(), Identity::new(1, 1))
        .unwrap()
        .token;

    for value in [
        token.clone(),
        format!("Basic {token}"),
        format!("Bearer {token} extra"),
    ] {
        let (status, json) = send(
            &app,
            with_auth(create_json_request("GET", "/api/v1/auth/me", None), &value),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "header: {value}");
        assert_eq!(json["code"], "BAD_REQUEST");
    }
}

fn expired_bearer(identity: Identity) -> String {
    let config = test_jwt_config();
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        iss: config.issuer.clone(),
        sub: identity.user_id.to_string(),
        role_id: identity.role_id,
        typ: TokenKind::Access,
        jti: "expired".to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

#[tokio::test]
async fn test_refresh_ignores_expired_bearer_header() {
    let app = create_router_for_testing();
    sign_up(&app, "a@b.com").await;
    let (_, tokens) = sign_in(&app, "a@b.com", "abcd").await;

    let request = with_auth(
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": tokens["refresh_token"] })),
        ),
        &expired_bearer(Identity::new(1, 1)),
    );
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["access_token"].is_string());
}

#[tokio::test]
async fn test_public_routes_ignore_authorization_header() {
    let app = create_router_for_testing();
    sign_up(&app, "a@b.com").await;

    for value in ["Bearer not.a.token", "Basic abc", "garbage"] {
        let request = with_auth(
            create_json_request(
                "POST",
                "/api/v1/auth/sign-in",
                Some(json!({ "email": "a@b.com", "password": "abcd" })),
            ),
            value,
        );
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK, "header: {value}");
    }
}

#[tokio::test]
async fn test_expired_bearer_rejected_on_protected_route() {
    let app = create_router_for_testing();
    let request = with_auth(
        create_json_request("GET", "/api/v1/auth/me", None),
        &expired_bearer(Identity::new(1, 1)),
    );
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_token_signed_with_other_secret() {
    let app = create_router_for_testing();
    let foreign = JwtConfig {
        secret: "someone-elses-secret".to_string(),
        ..Default::default()
    };
    let token = generate_access_token(&foreign, Identity::new(1, 2))
        .unwrap()
        .token;

    let (status, _) = send(
        &app,
        with_auth(
            create_json_request("GET", "/api/v1/auth/me", None),
            &format!("Bearer {token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = create_router_for_testing();
    sign_up(&app, "a@b.com").await;
    let (_, tokens) = sign_in(&app, "a@b.com", "abcd").await;

    let (status, _) = send(
        &app,
        with_auth(
            create_json_request("GET", "/api/v1/auth/me", None),
            &format!("Bearer {}", tokens["refresh_token"].as_str().unwrap()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn light_config() -> allince_core::AppConfig {
    let mut config = allince_core::AppConfig::default();
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config.auth.password = PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
        output_len: Some(32),
    };
    config
}
