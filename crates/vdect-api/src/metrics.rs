//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vdect_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vdect_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vdect_http_requests_in_flight";

    // Prediction metrics
    pub const PREDICTIONS_TOTAL: &str = "vdect_predictions_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "vdect_inference_duration_seconds";
    pub const SALIENCY_FALLBACK_TOTAL: &str = "vdect_saliency_fallback_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a completed prediction.
pub fn record_prediction(modality: &str, label: &str) {
    let labels = [
        ("modality", modality.to_string()),
        ("label", label.to_string()),
    ];
    counter!(names::PREDICTIONS_TOTAL, &labels).increment(1);
}

/// Record inference duration for one request.
pub fn record_inference_duration(modality: &str, duration_secs: f64) {
    let labels = [("modality", modality.to_string())];
    histogram!(names::INFERENCE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a saliency gradient-fallback activation.
pub fn record_saliency_fallback() {
    counter!(names::SALIENCY_FALLBACK_TOTAL).increment(1);
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
