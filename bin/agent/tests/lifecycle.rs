use std::time::Duration;

use compute_agent::{config::AgentConfig, http, state::AgentState};
use logger::{LogConfig, LogFormat};
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_config() -> &'static AgentConfig {
  Box::leak(Box::new(AgentConfig {
    token: "test-token".to_string(),
    http_bind: "127.0.0.1:0".to_string(),
    grpc_bind: "127.0.0.1:0".to_string(),
    memory_limit: None,
    default_page_size: wire::types::DEFAULT_PAGE_SIZE,
    result_ttl_secs: 60,
    cleanup_interval_secs: 30,
    signature_max_skew_secs: None,
    ssl_cert_file: None,
    ssl_key_file: None,
    logging: LogConfig { level: "error".to_string(), format: LogFormat::Pretty, ansi: false },
  }))
}

fn router() -> axum::Router {
  let state = AgentState::new(test_config()).expect("build agent state");
  http::app(state)
}

fn router_with_default_page_size(default_page_size: i32) -> axum::Router {
  let config: &'static AgentConfig = Box::leak(Box::new(AgentConfig {
    token: "test-token".to_string(),
    http_bind: "127.0.0.1:0".to_string(),
    grpc_bind: "127.0.0.1:0".to_string(),
    memory_limit: None,
    default_page_size,
    result_ttl_secs: 60,
    cleanup_interval_secs: 30,
    signature_max_skew_secs: None,
    ssl_cert_file: None,
    ssl_key_file: None,
    logging: LogConfig { level: "error".to_string(), format: LogFormat::Pretty, ansi: false },
  }));
  let state = AgentState::new(config).expect("build agent state");
  http::app(state)
}

async fn send(
  app: &axum::Router,
  method: &str,
  path: &str,
  body: Option<Value>,
) -> (axum::http::StatusCode, Value) {
  let builder = axum::http::Request::builder()
    .method(method)
    .uri(path)
    .header("x-agent-token", "test-token")
    .header("x-request-id", "r-test")
    .header("content-type", "application/json");
  let body = match body {
    Some(v) => axum::body::Body::from(serde_json::to_vec(&v).unwrap()),
    None => axum::body::Body::empty(),
  };
  let request = builder.body(body).unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

async fn poll_until_terminal(app: &axum::Router, query_id: &str) -> Value {
  for _ in 0..500 {
    let (status, body) = send(app, "GET", &format!("/queries/{query_id}"), None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    if body["status"].as_str().map(|s| matches!(s, "SUCCEEDED" | "FAILED" | "CANCELED")).unwrap_or(false) {
      return body;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("query {query_id} did not reach a terminal status in time");
}

#[tokio::test]
async fn simple_lifecycle_yields_one_row_one_page() {
  let app = router();

  let (status, submitted) =
    send(&app, "POST", "/queries", Some(json!({"sql": "SELECT 1 AS id", "request_id": "req-1"}))).await;
  assert_eq!(status, axum::http::StatusCode::ACCEPTED);
  let query_id = submitted["query_id"].as_str().unwrap().to_string();

  let terminal = poll_until_terminal(&app, &query_id).await;
  assert_eq!(terminal["status"], "SUCCEEDED");
  assert_eq!(terminal["row_count"], 1);

  let (status, page) = send(&app, "GET", &format!("/queries/{query_id}/results"), None).await;
  assert_eq!(status, axum::http::StatusCode::OK);
  assert_eq!(page["columns"], json!(["id"]));
  assert_eq!(page["rows"], json!([["1"]]));
  assert_eq!(page["next_page_token"], Value::Null);

  let (status, _) = send(&app, "DELETE", &format!("/queries/{query_id}"), None).await;
  assert_eq!(status, axum::http::StatusCode::OK);

  let (status, _) = send(&app, "GET", &format!("/queries/{query_id}"), None).await;
  assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn paged_lifecycle_splits_across_max_results() {
  let app = router();

  let (status, submitted) = send(
    &app,
    "POST",
    "/queries",
    Some(json!({"sql": "SELECT i FROM range(0, 2500) t(i)", "request_id": "req-paged"})),
  )
  .await;
  assert_eq!(status, axum::http::StatusCode::ACCEPTED);
  let query_id = submitted["query_id"].as_str().unwrap().to_string();

  let terminal = poll_until_terminal(&app, &query_id).await;
  assert_eq!(terminal["row_count"], 2500);

  let mut page_token = String::new();
  let mut total_rows = 0;
  let mut page_sizes = Vec::new();
  loop {
    let path = format!("/queries/{query_id}/results?max_results=1000&page_token={page_token}");
    let (status, page) = send(&app, "GET", &path, None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    let rows = page["rows"].as_array().unwrap();
    page_sizes.push(rows.len());
    total_rows += rows.len();
    let next = page["next_page_token"].as_str().unwrap_or("").to_string();
    if next.is_empty() {
      break;
    }
    page_token = next;
  }
  assert_eq!(page_sizes, vec![1000, 1000, 500]);
  assert_eq!(total_rows, 2500);
}

#[tokio::test]
async fn fetch_without_max_results_honors_the_configured_default_page_size() {
  let app = router_with_default_page_size(100);

  let (_, submitted) = send(
    &app,
    "POST",
    "/queries",
    Some(json!({"sql": "SELECT i FROM range(0, 250) t(i)", "request_id": "req-default-page"})),
  )
  .await;
  let query_id = submitted["query_id"].as_str().unwrap().to_string();
  poll_until_terminal(&app, &query_id).await;

  let (status, page) = send(&app, "GET", &format!("/queries/{query_id}/results"), None).await;
  assert_eq!(status, axum::http::StatusCode::OK);
  assert_eq!(page["rows"].as_array().unwrap().len(), 100);
  assert!(!page["next_page_token"].as_str().unwrap_or("").is_empty());
}

#[tokio::test]
async fn idempotent_resubmission_returns_same_query_id() {
  let app = router();
  let (_, first) =
    send(&app, "POST", "/queries", Some(json!({"sql": "SELECT 1", "request_id": "req-idem"}))).await;
  let (_, second) =
    send(&app, "POST", "/queries", Some(json!({"sql": "SELECT 2", "request_id": "req-idem"}))).await;
  assert_eq!(first["query_id"], second["query_id"]);
}

#[tokio::test]
async fn resubmission_after_terminal_allocates_a_fresh_query_id() {
  let app = router();
  let (_, first) = send(
    &app,
    "POST",
    "/queries",
    Some(json!({"sql": "SELECT 1", "request_id": "req-reuse"})),
  )
  .await;
  let first_id = first["query_id"].as_str().unwrap().to_string();
  poll_until_terminal(&app, &first_id).await;

  let (status, second) = send(
    &app,
    "POST",
    "/queries",
    Some(json!({"sql": "SELECT 2", "request_id": "req-reuse"})),
  )
  .await;
  assert_eq!(status, axum::http::StatusCode::ACCEPTED);
  assert_eq!(second["status"], "QUEUED");
  assert_ne!(second["query_id"], first_id);
}

#[tokio::test]
async fn cancel_on_terminal_job_is_a_noop() {
  let app = router();
  let (_, submitted) =
    send(&app, "POST", "/queries", Some(json!({"sql": "SELECT 1", "request_id": "req-cancel-done"}))).await;
  let query_id = submitted["query_id"].as_str().unwrap().to_string();
  poll_until_terminal(&app, &query_id).await;

  let (status, cancel_resp) = send(&app, "POST", &format!("/queries/{query_id}/cancel"), None).await;
  assert_eq!(status, axum::http::StatusCode::OK);
  assert_eq!(cancel_resp["status"], "SUCCEEDED");
}

#[tokio::test]
async fn delete_is_idempotent_absent() {
  let app = router();
  let (_, submitted) =
    send(&app, "POST", "/queries", Some(json!({"sql": "SELECT 1", "request_id": "req-del"}))).await;
  let query_id = submitted["query_id"].as_str().unwrap().to_string();
  poll_until_terminal(&app, &query_id).await;

  let (status, _) = send(&app, "DELETE", &format!("/queries/{query_id}"), None).await;
  assert_eq!(status, axum::http::StatusCode::OK);
  let (status, _) = send(&app, "DELETE", &format!("/queries/{query_id}"), None).await;
  assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fetch_before_ready_is_failed_precondition() {
  let app = router();
  // `sleep()` is DuckDB's built-in testing function for holding a query
  // open deterministically, rather than racing a fast-finishing query.
  let (_, submitted) =
    send(&app, "POST", "/queries", Some(json!({"sql": "SELECT sleep(2.0)", "request_id": "req-slow"}))).await;
  let query_id = submitted["query_id"].as_str().unwrap().to_string();

  let (status, body) = send(&app, "GET", &format!("/queries/{query_id}/results"), None).await;
  assert_eq!(status, axum::http::StatusCode::PRECONDITION_FAILED);
  assert_eq!(body["code"], "FAILED_PRECONDITION");

  let (status, _) = send(&app, "POST", &format!("/queries/{query_id}/cancel"), None).await;
  assert_eq!(status, axum::http::StatusCode::OK);
}

#[tokio::test]
async fn cancellation_converges_to_canceled() {
  let app = router();
  let (_, submitted) =
    send(&app, "POST", "/queries", Some(json!({"sql": "SELECT sleep(5.0)", "request_id": "req-cancel-live"})))
      .await;
  let query_id = submitted["query_id"].as_str().unwrap().to_string();

  let (status, _) = send(&app, "POST", &format!("/queries/{query_id}/cancel"), None).await;
  assert_eq!(status, axum::http::StatusCode::OK);

  let terminal = poll_until_terminal(&app, &query_id).await;
  assert_eq!(terminal["status"], "CANCELED");
  assert!(terminal["error"].as_str().is_some());

  let (status, body) = send(&app, "GET", &format!("/queries/{query_id}/results"), None).await;
  assert_eq!(status, axum::http::StatusCode::PRECONDITION_FAILED);
  assert_eq!(body["code"], "FAILED_PRECONDITION");
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
  let app = router();
  let request = axum::http::Request::builder()
    .method("GET")
    .uri("/queries/nonexistent")
    .body(axum::body::Body::empty())
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_unauthenticated() {
  let app = router();
  let request =
    axum::http::Request::builder().method("GET").uri("/health").body(axum::body::Body::empty()).unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), axum::http::StatusCode::OK);
}
