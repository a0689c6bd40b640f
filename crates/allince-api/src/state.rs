//! Application state management

use crate::auth::{AccountService, CredentialPolicy, JwtConfig, TokenService};
use allince_core::config::AppConfig;
use allince_core::{SessionStore, UserStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Latency histogram buckets for one endpoint
#[derive(Debug, Clone, Default)]
pub struct LatencyBuckets {
    pub under_10ms: u64,
    pub ms_10_50: u64,
    pub ms_50_100: u64,
    pub ms_100_500: u64,
    pub ms_500_1000: u64,
    pub over_1s: u64,
}

impl LatencyBuckets {
    fn observe(&mut self, latency_us: u64) {
        match latency_us {
            0..=9_999 => self.under_10ms += 1,
            10_000..=49_999 => self.ms_10_50 += 1,
            50_000..=99_999 => self.ms_50_100 += 1,
            100_000..=499_999 => self.ms_100_500 += 1,
            500_000..=999_999 => self.ms_500_1000 += 1,
            _ => self.over_1s += 1,
        }
    }
}

/// Request metrics for one route template
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    /// Responses by HTTP status code
    pub status_counts: HashMap<u16, u64>,
    pub latency_count: u64,
    pub total_latency_us: u64,
    pub latency_buckets: LatencyBuckets,
}

/// Counters for token issuance and gate outcomes
#[derive(Debug, Default)]
pub struct AuthCounters {
    pub tokens_issued: AtomicU64,
    pub refreshes: AtomicU64,
    pub gate_denials: AtomicU64,
    pub invalid_tokens: AtomicU64,
}

impl AuthCounters {
    pub fn record_sign_in(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gate_denial(&self) {
        self.gate_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_token(&self) {
        self.invalid_tokens.fetch_add(1, Ordering::Relaxed);
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Token issuance, verification and sessions
    pub tokens: TokenService,
    /// User and moderator account creation
    pub accounts: AccountService,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Per-endpoint request metrics
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
    pub auth_counters: AuthCounters,
}

impl AppState {
    /// Create application state from config and the two stores
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let tokens = TokenService::new(
            users.clone(),
            sessions.clone(),
            JwtConfig::from(&config.auth),
        );
        let accounts = AccountService::new(
            users.clone(),
            CredentialPolicy::default(),
            config.auth.password.clone(),
        );

        Self {
            config,
            tokens,
            accounts,
            users,
            sessions,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            metrics: RwLock::new(HashMap::new()),
            auth_counters: AuthCounters::default(),
        }
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let mut metrics = self.metrics.write().await;
        let entry = metrics.entry(endpoint).or_default();
        *entry.status_counts.entry(status).or_insert(0) += 1;
        entry.latency_count += 1;
        entry.total_latency_us += latency_us;
        entry.latency_buckets.observe(latency_us);
    }
}
