// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::api::*;
use crate::errors::Result;
use crate::master::{Master, QueryReport};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use knnmesh_kernel::{DataPoint, PointId, QueryId};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub type SharedMaster = Arc<Master>;

pub fn build_router(master: SharedMaster) -> Router {
    Router::new()
        .route("/points", post(add_point))
        .route("/points/:id", delete(remove_point))
        .route("/queries", post(submit_query))
        .route("/queries/:id", get(query_report).delete(forget_query))
        .route("/workers", get(workers))
        .route("/metrics", get(metrics_handler))
        .with_state(master)
}

/// Serves the client API until `shutdown` resolves.
pub async fn serve_http<F>(addr: SocketAddr, master: SharedMaster, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("HTTP API listening on {}", listener.local_addr()?);
    axum::serve(listener, build_router(master))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn add_point(
    State(master): State<SharedMaster>,
    Json(payload): Json<AddPointRequest>,
) -> Result<Json<AddPointResponse>> {
    let worker_id = master.add_point(DataPoint::new(payload.id, payload.vector))?;
    Ok(Json(AddPointResponse { id: payload.id, worker_id }))
}

async fn remove_point(
    State(master): State<SharedMaster>,
    Path(id): Path<u64>,
) -> Result<Json<RemovePointResponse>> {
    let removed = master.remove_point(PointId(id))?;
    Ok(Json(RemovePointResponse { removed }))
}

async fn submit_query(
    State(master): State<SharedMaster>,
    Json(payload): Json<SubmitQueryRequest>,
) -> Result<Json<SubmitQueryResponse>> {
    let target = DataPoint::new(PointId::default(), payload.vector);
    let query_id = master.submit_query(target, payload.metric, payload.k, payload.filter)?;
    Ok(Json(SubmitQueryResponse { query_id }))
}

async fn query_report(
    State(master): State<SharedMaster>,
    Path(id): Path<u64>,
) -> Result<Json<QueryReport>> {
    Ok(Json(master.query_report(QueryId(id))?))
}

async fn forget_query(
    State(master): State<SharedMaster>,
    Path(id): Path<u64>,
) -> Result<Json<ForgetQueryResponse>> {
    master.forget_query(QueryId(id))?;
    Ok(Json(ForgetQueryResponse { forgotten: true }))
}

async fn workers(State(master): State<SharedMaster>) -> Json<WorkersResponse> {
    let workers = master.workers();
    Json(WorkersResponse {
        num_workers: workers.len(),
        num_points: master.num_points(),
        workers,
    })
}

async fn metrics_handler() -> String {
    crate::telemetry::render_metrics()
}
