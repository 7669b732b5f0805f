// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const POINTS_ROUTED: &str = "knnmesh_points_routed_total";
pub const QUERIES_SUBMITTED: &str = "knnmesh_queries_submitted_total";
pub const QUERIES_COMPLETED: &str = "knnmesh_queries_completed_total";
pub const QUERY_DURATION: &str = "knnmesh_query_duration_seconds";
pub const REPLIES_RECEIVED: &str = "knnmesh_worker_replies_total";
pub const WORKERS_REGISTERED: &str = "knnmesh_workers_registered_total";
pub const WORKERS_DISCONNECTED: &str = "knnmesh_workers_disconnected_total";
pub const WORKERS_ACTIVE: &str = "knnmesh_workers_active";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Initialize Tracing (Logs)
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "knnmesh_node=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    // 2. Initialize Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => {
            tracing::warn!("Failed to install Prometheus recorder: {}", e);
            return;
        }
    }

    metrics::describe_counter!(POINTS_ROUTED, "Points accepted by the master and routed to a worker");
    metrics::describe_counter!(QUERIES_SUBMITTED, "Queries broadcast to workers");
    metrics::describe_counter!(QUERIES_COMPLETED, "Queries merged and marked complete");
    metrics::describe_histogram!(QUERY_DURATION, "Time from submission to completion");
    metrics::describe_counter!(REPLIES_RECEIVED, "Partial result sets received from workers");
    metrics::describe_counter!(WORKERS_REGISTERED, "Successful worker handshakes");
    metrics::describe_counter!(WORKERS_DISCONNECTED, "Workers dropped after a connection failure");
    metrics::describe_gauge!(WORKERS_ACTIVE, "Workers currently registered");

    metrics::gauge!(WORKERS_ACTIVE, 0.0);
}

/// Get the Prometheus handle to render metrics
pub fn render_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
