use mongodb::Client;
use std::time::Instant;

use super::connector::ping;

/// Result of a timed ping.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Driver error, when unhealthy
    pub message: Option<String>,
    pub response_time_ms: u64,
}

/// Pings the server and reports latency and any error.
pub async fn check_health_detailed(client: &Client) -> HealthStatus {
    let start = Instant::now();
    let result = ping(client).await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    HealthStatus {
        healthy: result.is_ok(),
        message: result.err().map(|e| e.to_string()),
        response_time_ms,
    }
}
