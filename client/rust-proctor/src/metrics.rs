use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    // API client
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_api_requests_total",
        "Total number of assessment API requests",
        &["endpoint", "status"]
    )
    .unwrap();

    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "proctor_api_request_duration_seconds",
        "Assessment API request duration in seconds",
        &["endpoint"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Session lifecycle
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_sessions_total",
        "Assessment sessions by lifecycle outcome",
        &["status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "proctor_sessions_active",
        "Number of sessions currently in progress"
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_answers_submitted_total",
        "Answer submissions by outcome",
        &["outcome"]
    )
    .unwrap();

    // Timer & heartbeat
    pub static ref HEARTBEATS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_heartbeats_total",
        "Heartbeats sent by outcome",
        &["status"]
    )
    .unwrap();

    pub static ref AUTO_SUBMITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_auto_submits_total",
        "Timer-triggered submissions by outcome",
        &["status"]
    )
    .unwrap();

    // Anti-cheat
    pub static ref SECURITY_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_security_events_total",
        "Security events observed by type",
        &["event_type"]
    )
    .unwrap();

    pub static ref SECURITY_REPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_security_reports_total",
        "Security event reports by outcome",
        &["status"]
    )
    .unwrap();

    pub static ref SNAPSHOT_POLLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "proctor_snapshot_polls_total",
        "Session snapshot polls by outcome",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Times an API call and records its outcome.
pub async fn track_api_call<F, T, E>(endpoint: &str, fut: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = fut.await;

    API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(start.elapsed().as_secs_f64());
    let status = if result.is_ok() { "success" } else { "error" };
    API_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();

    result
}
