//! Metrics tracking middleware
//!
//! Tracks request latency, counts and status codes for the Prometheus endpoint

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Series label shared by every request that matched no route
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Record count, status and latency for every request
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_label(&request);

    let response = next.run(request).await;

    let latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    state
        .record_request(endpoint, response.status().as_u16(), latency_us)
        .await;

    response
}

/// Route template the request matched, so the set of series stays bounded
fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_unrouted_request_is_unmatched() {
        let request = Request::builder()
            .uri("/nope-123x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(endpoint_label(&request), UNMATCHED_ENDPOINT);
    }
}
