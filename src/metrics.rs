//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("osutweet_http_requests_total", "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("metric can be created");

    // Sign-in Metrics
    pub static ref LOGIN_STEPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("osutweet_login_steps_total", "Sign-in handshake steps by outcome"),
        &["step", "outcome"]
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "osutweet_provider_request_duration_seconds",
            "Twitter OAuth/API call duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation", "status"]
    ).expect("metric can be created");

    // osu! API Metrics
    pub static ref OSU_API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("osutweet_osu_api_requests_total", "Total number of osu! API requests"),
        &["status"]
    ).expect("metric can be created");
    pub static ref OSU_SNAPSHOTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("osutweet_osu_snapshots_total", "Statistics snapshots recorded"),
        &["mode"]
    ).expect("metric can be created");

    // Application Metrics
    pub static ref USERS_TOTAL: IntGauge = IntGauge::new(
        "osutweet_users_total",
        "Total number of registered users"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("osutweet_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(LOGIN_STEPS_TOTAL.clone()))
        .expect("LOGIN_STEPS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()))
        .expect("PROVIDER_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(OSU_API_REQUESTS_TOTAL.clone()))
        .expect("OSU_API_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(OSU_SNAPSHOTS_TOTAL.clone()))
        .expect("OSU_SNAPSHOTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(USERS_TOTAL.clone()))
        .expect("USERS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record the duration of one provider call
pub fn observe_provider_call(operation: &str, success: bool, elapsed: Duration) {
    let status = if success { "success" } else { "error" };
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation, status])
        .observe(elapsed.as_secs_f64());
}
