// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::master::WorkerInfo;
use knnmesh_kernel::{DistanceMetric, PointFilter, PointId, QueryId, WorkerId};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct AddPointRequest {
    pub id: PointId,
    pub vector: Vec<f32>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct AddPointResponse {
    pub id: PointId,
    pub worker_id: WorkerId,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RemovePointResponse {
    pub removed: bool,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SubmitQueryRequest {
    pub vector: Vec<f32>,
    pub k: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub filter: Option<PointFilter>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SubmitQueryResponse {
    pub query_id: QueryId,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ForgetQueryResponse {
    pub forgotten: bool,
}

#[derive(Serialize, Debug)]
pub struct WorkersResponse {
    pub num_workers: usize,
    pub num_points: usize,
    pub workers: Vec<WorkerInfo>,
}
