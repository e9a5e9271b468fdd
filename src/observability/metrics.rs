//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pool_acquire_total` (counter): acquire attempts by result
//! - `pool_release_total` (counter): releases by reported outcome
//! - `pool_circuit_transitions_total` (counter): by endpoint and target state
//! - `pool_leases_expired_total` (counter): leases reclaimed by the sweeper
//! - `pool_active_leases` (gauge): outstanding leases per endpoint
//! - `pool_endpoint_score` (gauge): selection score per endpoint
//! - `pool_endpoint_circuit` (gauge): 0=closed, 1=open, 2=half-open
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library users and tests pay nothing
//! - Gauges are refreshed from `snapshot()` rather than on the hot path

use std::net::SocketAddr;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::CircuitState;
use crate::pool::EndpointSnapshot;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_acquire(result: &'static str) {
    metrics::counter!("pool_acquire_total", "result" => result).increment(1);
}

pub fn record_release(outcome: &'static str) {
    metrics::counter!("pool_release_total", "outcome" => outcome).increment(1);
}

pub fn record_circuit_transition(endpoint: &str, to: CircuitState) {
    metrics::counter!(
        "pool_circuit_transitions_total",
        "endpoint" => endpoint.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_leases_expired(count: usize) {
    metrics::counter!("pool_leases_expired_total").increment(count as u64);
}

/// Refresh per-endpoint gauges.
pub fn record_endpoint(snapshot: &EndpointSnapshot) {
    let endpoint = snapshot.id.clone();
    metrics::gauge!("pool_active_leases", "endpoint" => endpoint.clone()).set(snapshot.active_leases as f64);
    metrics::gauge!("pool_endpoint_score", "endpoint" => endpoint.clone()).set(snapshot.score);
    metrics::gauge!("pool_endpoint_circuit", "endpoint" => endpoint).set(snapshot.circuit_state as u8 as f64);
}
