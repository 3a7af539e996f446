//! Metrics for event store queries.

use metrics::{counter, histogram};
use std::time::Instant;

/// Which query of the listing service ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Paginated listing aggregation
    Listing,
    /// Random sample of upcoming events
    Popular,
    /// Full category list
    Categories,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Popular => "popular",
            Self::Categories => "categories",
        }
    }
}

/// Listing metrics recorder
pub struct ListingMetrics;

impl ListingMetrics {
    pub fn record_success(kind: QueryKind, results: usize, duration_secs: f64) {
        counter!("event_queries_total", "kind" => kind.as_str(), "status" => "success")
            .increment(1);
        histogram!("event_query_duration_seconds", "kind" => kind.as_str()).record(duration_secs);
        histogram!("event_query_results", "kind" => kind.as_str()).record(results as f64);

        tracing::debug!(
            kind = kind.as_str(),
            results,
            duration_ms = (duration_secs * 1000.0) as u64,
            "Event query completed"
        );
    }

    pub fn record_failure(kind: QueryKind, error: &str) {
        counter!("event_queries_total", "kind" => kind.as_str(), "status" => "error")
            .increment(1);

        tracing::warn!(kind = kind.as_str(), error, "Event query failed");
    }

    /// Client-side validation failures never reach the store.
    pub fn record_rejected(kind: QueryKind) {
        counter!("event_queries_total", "kind" => kind.as_str(), "status" => "rejected")
            .increment(1);
    }
}

/// Measures one query and records it through [`ListingMetrics`].
///
/// ```rust,ignore
/// let timer = QueryTimer::start(QueryKind::Listing);
/// let result = store.aggregate_page(&stages, page).await;
/// timer.finish(result.as_ref().map(|page| page.docs.len()));
/// ```
pub struct QueryTimer {
    kind: QueryKind,
    start: Instant,
}

impl QueryTimer {
    pub fn start(kind: QueryKind) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }

    pub fn finish<E: std::fmt::Display>(self, outcome: Result<usize, E>) {
        match outcome {
            Ok(results) => ListingMetrics::record_success(
                self.kind,
                results,
                self.start.elapsed().as_secs_f64(),
            ),
            Err(e) => ListingMetrics::record_failure(self.kind, &e.to_string()),
        }
    }
}
