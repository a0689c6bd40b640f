//! Health check handlers

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub user_store: String,
    pub session_store: String,
}

/// Readiness probe
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let is_ready = state.is_ready();

    let response = ReadinessResponse {
        ready: is_ready,
        checks: ReadinessChecks {
            user_store: state.users.name().to_string(),
            session_store: state.sessions.name().to_string(),
        },
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

fn push_metric(output: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {kind}");
    let _ = writeln!(output, "{name} {value}\n");
}

/// Prometheus-compatible metrics endpoint
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Prometheus text exposition", body = String, content_type = "text/plain")
    )
)]
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let counters = &state.auth_counters;
    let mut output = String::new();

    push_metric(
        &mut output,
        "allince_uptime_seconds",
        "gauge",
        "Time since server start",
        state.uptime_secs(),
    );
    push_metric(
        &mut output,
        "allince_requests_total",
        "counter",
        "Total number of HTTP requests",
        state.get_request_count(),
    );
    push_metric(
        &mut output,
        "allince_sign_ins_total",
        "counter",
        "Token pairs issued by sign-in",
        counters.tokens_issued.load(Ordering::Relaxed),
    );
    push_metric(
        &mut output,
        "allince_refreshes_total",
        "counter",
        "Access tokens minted from a refresh token",
        counters.refreshes.load(Ordering::Relaxed),
    );
    push_metric(
        &mut output,
        "allince_gate_denials_total",
        "counter",
        "Requests rejected by a role-tier gate",
        counters.gate_denials.load(Ordering::Relaxed),
    );
    push_metric(
        &mut output,
        "allince_invalid_tokens_total",
        "counter",
        "Bearer tokens that failed verification",
        counters.invalid_tokens.load(Ordering::Relaxed),
    );

    let _ = writeln!(
        output,
        "# HELP allince_build_info Build information\n# TYPE allince_build_info gauge\nallince_build_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    );

    let metrics = state.metrics.read().await;
    let mut endpoints: Vec<_> = metrics.iter().collect();
    endpoints.sort_by(|a, b| a.0.cmp(b.0));

    output.push_str("# HELP allince_http_requests_total HTTP requests by endpoint and status\n");
    output.push_str("# TYPE allince_http_requests_total counter\n");
    for (endpoint, endpoint_metrics) in &endpoints {
        let mut statuses: Vec<_> = endpoint_metrics.status_counts.iter().collect();
        statuses.sort();
        for (status, count) in statuses {
            let _ = writeln!(
                output,
                "allince_http_requests_total{{endpoint=\"{endpoint}\",status=\"{status}\"}} {count}"
            );
        }
    }
    output.push('\n');

    output.push_str("# HELP allince_http_request_duration_seconds HTTP request latency\n");
    output.push_str("# TYPE allince_http_request_duration_seconds histogram\n");
    for (endpoint, endpoint_metrics) in &endpoints {
        if endpoint_metrics.latency_count == 0 {
            continue;
        }

        let buckets = &endpoint_metrics.latency_buckets;
        let mut cumulative = 0u64;
        for (le, count) in [
            ("0.01", buckets.under_10ms),
            ("0.05", buckets.ms_10_50),
            ("0.1", buckets.ms_50_100),
            ("0.5", buckets.ms_100_500),
            ("1.0", buckets.ms_500_1000),
            ("+Inf", buckets.over_1s),
        ] {
            cumulative += count;
            let _ = writeln!(
                output,
                "allince_http_request_duration_seconds_bucket{{endpoint=\"{endpoint}\",le=\"{le}\"}} {cumulative}"
            );
        }

        let total_sum_s = (endpoint_metrics.total_latency_us as f64) / 1_000_000.0;
        let _ = writeln!(
            output,
            "allince_http_request_duration_seconds_sum{{endpoint=\"{endpoint}\"}} {total_sum_s:.6}"
        );
        let _ = writeln!(
            output,
            "allince_http_request_duration_seconds_count{{endpoint=\"{endpoint}\"}} {}",
            endpoint_metrics.latency_count
        );
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
