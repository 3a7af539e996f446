//! Prometheus metrics for the events services.
//!
//! - [`init_metrics`] installs the global recorder
//! - [`metrics_handler`] renders the `/metrics` endpoint
//! - [`middleware::metrics_middleware`] records per-route HTTP metrics
//! - [`ListingMetrics`] records listing, popular and category query metrics
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler};
//!
//! init_metrics()?;
//! let app = Router::new().route("/metrics", get(metrics_handler));
//! ```

pub mod listings;
pub mod middleware;

pub use listings::{ListingMetrics, QueryKind, QueryTimer};
pub use middleware::metrics_middleware;

pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the Prometheus recorder once; later calls return the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();
        Ok(handle)
    })
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for `/metrics`.
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    describe_counter!(
        "event_queries_total",
        "Event store queries by kind and outcome"
    );
    describe_histogram!(
        "event_query_duration_seconds",
        "Event store query duration in seconds"
    );
    describe_histogram!(
        "event_query_results",
        "Documents returned per event store query"
    );
}
