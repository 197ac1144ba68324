use cluster_operator::config::OperatorConfig;
use cluster_operator::core::state::ServerState;
use cluster_operator::server::build_router;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> OperatorConfig {
    OperatorConfig {
        ip: "127.0.0.1".to_string(),
        port: 0,
        env: "test".to_string(),
        clusters: 4,
        shards: 16,
        auth: "s3cr3t".to_string(),
        webhook: None,
        metrics_prefix: String::new(),
        metrics: vec![],
        merge_metrics: true,
        log_events: false,
    }
}

fn router() -> axum::Router {
    cluster_operator::core::metrics::register("");
    let state = Arc::new(ServerState::new(test_config()));
    build_router(state)
}

#[tokio::test]
async fn shard_count_requires_auth() {
    let request = axum::http::Request::builder()
        .uri("/shardCount")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn shard_count_returns_the_configured_shard_and_cluster_count() {
    let request = axum::http::Request::builder()
        .uri("/shardCount")
        .header("authorization", "s3cr3t")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["shards"], 16);
    assert_eq!(body["data"]["clusterCount"], 4);
}

#[tokio::test]
async fn eval_rejects_a_missing_timeout() {
    let request = axum::http::Request::builder()
        .uri("/eval")
        .method("POST")
        .header("authorization", "s3cr3t")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            serde_json::json!({"id": "r1", "code": "1+1"}).to_string(),
        ))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn eval_with_no_ready_clusters_reports_every_slot_as_not_ready() {
    let request = axum::http::Request::builder()
        .uri("/eval")
        .method("POST")
        .header("authorization", "s3cr3t")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            serde_json::json!({"id": "r1", "code": "1+1", "timeout": 200}).to_string(),
        ))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 4);
    assert!(
        data.iter()
            .all(|entry| entry["error"] == "Cluster is not ready!")
    );
}

#[tokio::test]
async fn metrics_scrape_with_no_ready_clusters_emits_zeroed_gauges() {
    let request = axum::http::Request::builder()
        .uri("/metrics")
        .header("authorization", "s3cr3t")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("cluster_count"));
}
