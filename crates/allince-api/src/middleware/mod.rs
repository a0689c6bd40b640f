//! HTTP middleware shared by all routes

pub mod metrics;

pub use metrics::metrics_middleware;
