use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use knnmesh_node::api::{AddPointResponse, SubmitQueryResponse};
use knnmesh_node::config::{MasterConfig, WorkerConfig};
use knnmesh_node::master::Master;
use knnmesh_node::server::build_router;
use knnmesh_node::worker::Worker;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for oneshot

async fn master() -> Arc<Master> {
    let cfg = MasterConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        http_addr: None,
        ..MasterConfig::default()
    };
    Arc::new(Master::bind(cfg).await.unwrap())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_errors_map_to_status_codes() {
    let master = master().await;
    let app = build_router(master.clone());

    let (status, body) = send(&app, "POST", "/points", Some(json!({"id": 1, "vector": [1.0]}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("No active workers"));

    let (status, _) = send(&app, "GET", "/queries/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/points", Some(json!({"id": 1, "vector": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    master.shutdown().await;
}

#[tokio::test]
async fn test_point_and_query_round_trip() {
    let master = master().await;
    let worker = Worker::connect(&WorkerConfig::new(master.local_addr().to_string()))
        .await
        .unwrap();
    let worker_task = tokio::spawn(worker.run());
    let app = build_router(master.clone());

    for (id, vector) in [(1, [0.0, 0.0]), (2, [1.0, 0.0]), (3, [5.0, 5.0])] {
        let (status, body) = send(&app, "POST", "/points", Some(json!({"id": id, "vector": vector}))).await;
        assert_eq!(status, StatusCode::OK);
        let added: AddPointResponse = serde_json::from_value(body).unwrap();
        assert_eq!(added.id.0, id);
    }

    let (status, body) = send(&app, "POST", "/queries", Some(json!({"vector": [0.1, 0.0], "k": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    let submitted: SubmitQueryResponse = serde_json::from_value(body).unwrap();
    let uri = format!("/queries/{}", submitted.query_id.0);

    let mut report = Value::Null;
    for _ in 0..500 {
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        if body["complete"] == json!(true) {
            report = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(report["status"], "complete");
    assert_eq!(report["metric"], "euclidean");
    let ids: Vec<u64> = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);

    let (status, body) = send(&app, "GET", "/workers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["num_workers"], 1);
    assert_eq!(body["num_points"], 3);
    assert_eq!(body["workers"][0]["state"], "active");

    let (status, body) = send(&app, "DELETE", "/points/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    master.shutdown().await;
    worker_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_query_is_rejected() {
    let master = master().await;
    let worker = Worker::connect(&WorkerConfig::new(master.local_addr().to_string()))
        .await
        .unwrap();
    let worker_task = tokio::spawn(worker.run());
    let app = build_router(master.clone());

    let (status, _) = send(&app, "POST", "/queries", Some(json!({"vector": [1.0], "k": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/queries",
        Some(json!({"vector": [1.0], "k": 1, "metric": "chebyshev"})),
    )
    .await;
    assert!(status.is_client_error());

    let (status, body) = send(
        &app,
        "POST",
        "/queries",
        Some(json!({"vector": [1.0], "k": 1, "metric": "cosine", "filter": {"allow": [1, 2]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["query_id"].as_u64().is_some());

    master.shutdown().await;
    worker_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_reports_abandoned_queries() {
    let master = master().await;
    let worker = Worker::connect(&WorkerConfig::new(master.local_addr().to_string()))
        .await
        .unwrap();
    let worker_task = tokio::spawn(worker.run());
    let app = build_router(master.clone());

    master.shutdown().await;
    worker_task.await.unwrap().unwrap();

    let (status, body) = send(&app, "POST", "/queries", Some(json!({"vector": [1.0], "k": 1}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("shutting down"));
}

#[tokio::test]
async fn test_metrics_endpoint_responds() {
    let master = master().await;
    let app = build_router(master.clone());
    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    master.shutdown().await;
}
