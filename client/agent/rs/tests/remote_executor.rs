//! Exercises `RemoteExecutor` against a real agent bound to an ephemeral
//! port, rather than the in-process `tower::ServiceExt::oneshot` style used
//! inside the agent's own test suite — this crate's whole job is driving a
//! real transport, so the test has to actually open a socket.

use agent_client::{RemoteExecutor, Transport};
use compute_agent::config::AgentConfig;
use compute_agent::{http, state::AgentState};
use logger::{LogConfig, LogFormat};
use sql_engine::{DuckDbConnectionManager, Engine};
use tokio_util::sync::CancellationToken;

fn test_config() -> &'static AgentConfig {
  Box::leak(Box::new(AgentConfig {
    token: "client-test-token".to_string(),
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

/// Spawns a live agent on a real loopback port and returns its base URL.
async fn spawn_agent() -> String {
  let state = AgentState::new(test_config()).expect("build agent state");
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
  let addr = listener.local_addr().expect("local addr");
  let app = http::app(state);
  tokio::spawn(async move {
    axum::serve(listener, app).await.expect("agent http server");
  });
  format!("http://{addr}")
}

fn staging_engine() -> Engine {
  let manager = DuckDbConnectionManager::memory().expect("open staging engine");
  let pool = r2d2::Pool::builder().build(manager).expect("build staging pool");
  Engine::new(pool)
}

#[tokio::test]
async fn remote_executor_materializes_query_results_locally() {
  let base_url = spawn_agent().await;
  let transport =
    Transport::from_url(&base_url, "client-test-token".to_string()).expect("construct transport");
  let executor = RemoteExecutor::new(transport, staging_engine());

  executor.ping().await.expect("agent health check");

  let ctx = executor
    .query_context("SELECT i, i * i AS squared FROM range(0, 5) t(i)", CancellationToken::new())
    .await
    .expect("query lifecycle");
  assert_eq!(ctx.columns, vec!["i".to_string(), "squared".to_string()]);
  assert_eq!(ctx.row_count, 5);

  let rows = ctx.fetch_page(10, 0).await.expect("fetch staged rows");
  assert_eq!(rows.len(), 5);
  assert_eq!(rows[2], vec![Some("2".to_string()), Some("4".to_string())]);

  ctx.close().await.expect("drop staging relation");
}

#[tokio::test]
async fn remote_executor_surfaces_auth_failure() {
  let base_url = spawn_agent().await;
  let transport =
    Transport::from_url(&base_url, "wrong-token".to_string()).expect("construct transport");
  let executor = RemoteExecutor::new(transport, staging_engine());

  let err = executor.ping().await.expect_err("wrong token must be rejected");
  match err {
    agent_client::ClientError::HttpStatus { status, .. } => assert_eq!(status, 401),
    other => panic!("expected an HttpStatus(401) error, got {other:?}"),
  }
}

#[tokio::test]
async fn remote_executor_propagates_query_failure() {
  let base_url = spawn_agent().await;
  let transport =
    Transport::from_url(&base_url, "client-test-token".to_string()).expect("construct transport");
  let executor = RemoteExecutor::new(transport, staging_engine());

  let err = executor
    .query_context("SELECT * FROM this_table_does_not_exist", CancellationToken::new())
    .await
    .expect_err("a query against a missing table must fail");
  assert!(matches!(err, agent_client::ClientError::QueryFailed { .. }));
}

#[tokio::test]
async fn cancellation_token_cancels_an_in_flight_remote_query() {
  let base_url = spawn_agent().await;
  let transport =
    Transport::from_url(&base_url, "client-test-token".to_string()).expect("construct transport");
  let executor = RemoteExecutor::new(transport, staging_engine());

  let cancel = CancellationToken::new();
  let cancel_clone = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel_clone.cancel();
  });

  let err = executor
    .query_context("SELECT sleep(5.0)", cancel)
    .await
    .expect_err("a canceled query must surface as an error");
  assert!(matches!(err, agent_client::ClientError::QueryCanceled { .. }));
}
