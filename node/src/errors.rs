// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use knnmesh_kernel::error::KernelError;
use knnmesh_kernel::{QueryId, WorkerId};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
    #[error("No active workers available")]
    NoWorkersAvailable,
    #[error("Unknown query id {0}")]
    UnknownQueryId(QueryId),
    #[error("Query {0} was abandoned and will never complete")]
    QueryAbandoned(QueryId),
    #[error("Gave up waiting for query {0}")]
    QueryTimedOut(QueryId),
    #[error("Worker {0} disconnected")]
    WorkerDisconnected(WorkerId),
    #[error("Master is shutting down")]
    ShuttingDown,
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, MeshError>;

impl IntoResponse for MeshError {
    fn into_response(self) -> Response {
        let status = match &self {
            MeshError::Kernel(_) | MeshError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MeshError::NoWorkersAvailable | MeshError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            MeshError::UnknownQueryId(_) => StatusCode::NOT_FOUND,
            MeshError::QueryAbandoned(_) => StatusCode::GONE,
            MeshError::QueryTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
