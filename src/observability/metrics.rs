//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, route, status
//! - `proxy_request_duration_seconds` (histogram): latency by route
//! - `proxy_bypass_fetch_total` (counter): CDN bypass refreshes by outcome
//! - `proxy_realtime_rebroadcast_total` (counter): push events fanned out
//! - `proxy_events_forwarded_total` (counter): batch passthroughs by upstream status
//!
//! # Design Decisions
//! - Labels use the matched route template, never the raw path (keys live in paths)
//! - The exporter is optional; without it the macros record into a no-op recorder

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_bypass_fetch(outcome: &'static str) {
    counter!("proxy_bypass_fetch_total", "outcome" => outcome).increment(1);
}

pub fn record_rebroadcast() {
    counter!("proxy_realtime_rebroadcast_total").increment(1);
}

pub fn record_events_forwarded(status: u16) {
    counter!("proxy_events_forwarded_total", "status" => status.to_string()).increment(1);
}

/// Middleware recording count and latency for every routed request.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start);
    response
}
