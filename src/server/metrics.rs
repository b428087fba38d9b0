use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Nucleus metrics
const PREFIX: &str = "nucleus";

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
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 60.0, 300.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Enrichment Metrics
    pub static ref ENRICHMENT_OUTCOMES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_enrichment_outcomes_total"),
            "Per-candidate enrichment outcomes by bucket and reason"
        ),
        &["outcome", "reason"]
    ).expect("Failed to create enrichment_outcomes_total metric");

    pub static ref COLLECTION_TRACKS: Gauge = Gauge::new(
        format!("{PREFIX}_collection_tracks"),
        "Number of tracks in the collection"
    ).expect("Failed to create collection_tracks metric");

    // Credential Rotation Metrics
    pub static ref CREDENTIAL_RECOVERIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_credential_recoveries_total"),
            "Calls that succeeded only after rotating past failing credentials"
        ),
        &["pool"]
    ).expect("Failed to create credential_recoveries_total metric");

    pub static ref CREDENTIAL_EXHAUSTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_credential_exhaustions_total"),
            "Calls where every credential in the pool failed"
        ),
        &["pool"]
    ).expect("Failed to create credential_exhaustions_total metric");

    // Chat Metrics
    pub static ref CHAT_TURNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_chat_turns_total"), "Chat turns by channel kind and status"),
        &["channel", "status"]
    ).expect("Failed to create chat_turns_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Already-registered errors are expected when tests call this repeatedly
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ENRICHMENT_OUTCOMES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(COLLECTION_TRACKS.clone()));
    let _ = REGISTRY.register(Box::new(CREDENTIAL_RECOVERIES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CREDENTIAL_EXHAUSTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CHAT_TURNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// `outcome` is one of success / skipped / failed; `reason` is empty for successes.
pub fn record_enrichment_outcome(outcome: &str, reason: &str) {
    ENRICHMENT_OUTCOMES_TOTAL
        .with_label_values(&[outcome, reason])
        .inc();
}

pub fn set_collection_size(count: usize) {
    COLLECTION_TRACKS.set(count as f64);
}

pub fn record_credential_recovery(pool: &str) {
    CREDENTIAL_RECOVERIES_TOTAL.with_label_values(&[pool]).inc();
}

pub fn record_credential_exhaustion(pool: &str) {
    CREDENTIAL_EXHAUSTIONS_TOTAL.with_label_values(&[pool]).inc();
}

pub fn record_chat_turn(channel: &str, status: &str) {
    CHAT_TURNS_TOTAL.with_label_values(&[channel, status]).inc();
}

pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<f64>().ok());
            if let Some(kb) = rss_kb {
                PROCESS_MEMORY_BYTES.set(kb * 1024.0);
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
