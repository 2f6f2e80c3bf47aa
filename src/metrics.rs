//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "bird_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Database Metrics
    pub static ref DB_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_db_queries_total", "Total number of database queries"),
        &["operation", "table"]
    ).expect("metric can be created");
    pub static ref DB_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "bird_db_query_duration_seconds",
            "Database query duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation", "table"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("bird_cache_size", "Current number of items in cache"),
        &["cache_name"]
    ).expect("metric can be created");

    // Content Metrics
    pub static ref BIRDS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_birds_created_total", "Total number of posts created"),
        &["post_type"]
    ).expect("metric can be created");
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_media_uploads_total", "Total number of media uploads"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref THUMBNAIL_JOBS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_thumbnail_jobs_total", "Video thumbnail jobs by outcome"),
        &["status"]
    ).expect("metric can be created");

    // Chat Metrics
    pub static ref CHAT_CONNECTIONS_ACTIVE: IntGauge = IntGauge::new(
        "bird_chat_connections_active",
        "Currently open chat WebSocket connections"
    ).expect("metric can be created");
    pub static ref CHAT_ROOMS_ACTIVE: IntGauge = IntGauge::new(
        "bird_chat_rooms_active",
        "Chat rooms with at least one live broadcast group"
    ).expect("metric can be created");
    pub static ref CHAT_MESSAGES_TOTAL: IntCounter = IntCounter::new(
        "bird_chat_messages_total",
        "Total number of chat messages persisted"
    ).expect("metric can be created");

    // Integration Metrics
    pub static ref RECOMMENDATION_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_recommendation_requests_total", "Calls to the recommendation service"),
        &["endpoint", "status"]
    ).expect("metric can be created");
    pub static ref RECOMMENDATION_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "bird_recommendation_request_duration_seconds",
            "Recommendation service call duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0]),
        &["endpoint"]
    ).expect("metric can be created");
    pub static ref PAYMENT_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_payment_events_total", "Checkout and webhook events"),
        &["event", "status"]
    ).expect("metric can be created");

    // Application Metrics
    pub static ref USERS_TOTAL: IntGauge = IntGauge::new(
        "bird_users_total",
        "Total number of registered users"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bird_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(HTTP_REQUESTS_TOTAL.clone()),
            Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
            Box::new(DB_QUERIES_TOTAL.clone()),
            Box::new(DB_QUERY_DURATION_SECONDS.clone()),
            Box::new(CACHE_HITS_TOTAL.clone()),
            Box::new(CACHE_MISSES_TOTAL.clone()),
            Box::new(CACHE_SIZE.clone()),
            Box::new(BIRDS_CREATED_TOTAL.clone()),
            Box::new(MEDIA_UPLOADS_TOTAL.clone()),
            Box::new(THUMBNAIL_JOBS_TOTAL.clone()),
            Box::new(CHAT_CONNECTIONS_ACTIVE.clone()),
            Box::new(CHAT_ROOMS_ACTIVE.clone()),
            Box::new(CHAT_MESSAGES_TOTAL.clone()),
            Box::new(RECOMMENDATION_REQUESTS_TOTAL.clone()),
            Box::new(RECOMMENDATION_REQUEST_DURATION_SECONDS.clone()),
            Box::new(PAYMENT_EVENTS_TOTAL.clone()),
            Box::new(USERS_TOTAL.clone()),
            Box::new(ERRORS_TOTAL.clone()),
        ];

        for collector in collectors {
            if let Err(error) = REGISTRY.register(collector) {
                tracing::error!(%error, "Failed to register metric");
            }
        }

        tracing::info!("Metrics registry initialized");
    });
}

/// Record one database query with its duration.
pub fn observe_db_query(operation: &str, table: &str, elapsed: Duration) {
    DB_QUERIES_TOTAL
        .with_label_values(&[operation, table])
        .inc();
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(elapsed.as_secs_f64());
}

/// Record one recommendation service call.
pub fn observe_recommendation(endpoint: &str, status: &str, elapsed: Duration) {
    RECOMMENDATION_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();
    RECOMMENDATION_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
}
