//! Metrics collection and exposition.
//!
//! # Metrics
//! - `uploader_instances_started_total` (counter): instances that reached Running
//! - `uploader_reloads_total` (counter): reload intents acted upon
//! - `uploader_inflight_requests` (gauge): admitted, unfinished requests
//! - `uploader_uploads_total` (counter): stored / failed uploads by `status`
//!
//! # Design Decisions
//! - Recording is always on; without an installed recorder it is a no-op
//! - The Prometheus exporter serves its own listener, outside any instance,
//!   so it survives reloads

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}
