//! Prometheus metrics for the relay.
//!
//! Exposed in Prometheus text format on the address given by `METRICS_BIND`.
//!
//! # Metrics
//!
//! - **WebSocket**: active and total connections, frames in and out
//! - **Bus**: frames rejected and frames lost to lagging connections
//! - **Tournaments**: created, finished, cancelled, live count

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with a scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

pub fn websocket_connections_active(count: u64) {
    metrics::gauge!("websocket_connections_active").set(count as f64);
}

pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

/// A frame went out to a connection.
pub fn frames_sent() {
    metrics::counter!("relay_frames_sent_total").increment(1);
}

/// A connection's frame was published on the bus.
pub fn frames_received(kind: &'static str) {
    metrics::counter!("relay_frames_received_total", "kind" => kind).increment(1);
}

// ============================================================================
// Bus Metrics
// ============================================================================

pub fn frames_rejected(reason: &'static str) {
    metrics::counter!("relay_frames_rejected_total", "reason" => reason).increment(1);
}

pub fn frames_dropped(count: u64) {
    metrics::counter!("relay_frames_dropped_total").increment(count);
}

// ============================================================================
// Tournament Metrics
// ============================================================================

/// Count one authoritative tournament frame.
pub fn tournament_event(kind: &'static str) {
    match kind {
        "tournament-start" => metrics::counter!("tournaments_created_total").increment(1),
        "tournament-end" => metrics::counter!("tournaments_finished_total").increment(1),
        "tournament-cancel" => metrics::counter!("tournaments_cancelled_total").increment(1),
        _ => {}
    }
}

pub fn active_tournaments(count: usize) {
    metrics::gauge!("active_tournaments").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        websocket_connections_total();
        websocket_connections_active(3);
        frames_received("tournament-join");
        frames_rejected("authoritative");
        frames_dropped(4);
        tournament_event("tournament-start");
        tournament_event("tournament-notice");
        active_tournaments(1);
    }
}
