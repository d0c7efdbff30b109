use crate::library_store::{EntityKind, LibraryDelta, LibraryStore};
use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all library metrics
const PREFIX: &str = "pezzottify_library";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Authentication Metrics
    pub static ref AUTH_LOGIN_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_auth_login_attempts_total"), "Total login attempts"),
        &["status"]
    ).expect("Failed to create auth_login_attempts_total metric");

    pub static ref AUTH_LOGIN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_auth_login_duration_seconds"),
            "Login request duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0])
    ).expect("Failed to create auth_login_duration_seconds metric");

    // Library Metrics
    pub static ref STORE_WRITES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_store_writes_total"), "Successful store writes"),
        &["kind", "operation"]
    ).expect("Failed to create store_writes_total metric");

    pub static ref DELTA_ITEMS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_delta_items_total"),
            "Entities and tombstones served by delta reads"
        ),
        &["kind"]
    ).expect("Failed to create delta_items_total metric");

    pub static ref LIBRARY_ITEMS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_library_items_total"), "Live entities in the library"),
        &["kind"]
    ).expect("Failed to create library_items_total metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "API errors by code"),
        &["error_code"]
    ).expect("Failed to create errors_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_ATTEMPTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(STORE_WRITES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DELTA_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LIBRARY_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Sets the library size gauges from the store's live counts.
pub fn update_library_metrics(store: &dyn LibraryStore) {
    for kind in EntityKind::ALL {
        match store.count(kind) {
            Ok(count) => LIBRARY_ITEMS_TOTAL
                .with_label_values(&[kind.as_str()])
                .set(count as f64),
            Err(err) => tracing::warn!("Could not count {} entities: {}", kind, err),
        }
    }
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_login_attempt(status: &str, duration: Duration) {
    AUTH_LOGIN_ATTEMPTS_TOTAL.with_label_values(&[status]).inc();
    AUTH_LOGIN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_store_write(kind: EntityKind, operation: &str) {
    STORE_WRITES_TOTAL
        .with_label_values(&[kind.as_str(), operation])
        .inc();
}

pub fn record_delta_items(kind: EntityKind, count: usize) {
    DELTA_ITEMS_TOTAL
        .with_label_values(&[kind.as_str()])
        .inc_by(count as f64);
}

pub fn record_delta(delta: &LibraryDelta) {
    for (kind, count) in delta.counts_by_kind() {
        record_delta_items(kind, count);
    }
}

pub fn record_error(error_code: &str) {
    ERRORS_TOTAL.with_label_values(&[error_code]).inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
