//! Prometheus metrics for monitoring the betting server.
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter, so
//! handlers call these helpers unconditionally.
//!
//! # Metrics Categories
//!
//! - **HTTP**: request counts and durations
//! - **Ledger**: bets placed and settled, wallet transactions
//! - **Auth**: login attempts and throttle hits
//! - **WebSocket**: active connections

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

pub fn bets_placed_total(corner: &str) {
    metrics::counter!("bets_placed_total", "corner" => corner.to_string()).increment(1);
}

/// Count settled bets by outcome (`won`, `lost`, `refunded`, `failed`).
pub fn bets_settled_total(outcome: &'static str, count: usize) {
    metrics::counter!("bets_settled_total", "outcome" => outcome).increment(count as u64);
}

pub fn wallet_transactions_total(kind: &str, status: &str) {
    metrics::counter!("wallet_transactions_total",
        "type" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment login attempts counter.
pub fn login_attempts_total(success: bool) {
    metrics::counter!("login_attempts_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(endpoint: &str) {
    metrics::counter!("rate_limit_hits_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Set current active WebSocket connections count.
pub fn websocket_connections_active(count: usize) {
    metrics::gauge!("websocket_connections_active").set(count as f64);
}
