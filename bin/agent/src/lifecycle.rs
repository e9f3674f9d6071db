//! The agent's query lifecycle engine: implements the wire contract on top
//! of [`crate::store::Store`] and an embedded [`sql_engine::Engine`].

use std::sync::Arc;

use sql_engine::Engine;
use wire::{
  AgentError, Status,
  error::ErrorCode,
  page_token,
  types::{
    ExecuteResponse, FetchQueryResultsResponse, GetQueryStatusResponse, HealthResponse,
    QueryStatusResponse, Row, SubmitQueryResponse, clamp_page_size,
  },
};

use crate::state::AgentState;
use crate::store::{JobSnapshot, QueryJob};

fn result_table_name(query_id: &str) -> String {
  format!("_result_{query_id}")
}

pub async fn submit_query(
  state: &AgentState,
  sql: String,
  request_id: String,
) -> Result<SubmitQueryResponse, AgentError> {
  if sql.trim().is_empty() {
    return Err(AgentError::new(ErrorCode::InvalidArgument, "sql must not be empty", request_id));
  }

  state.store.maybe_cleanup(&state.engine).await;

  if let Some(existing) = state.store.get_by_request_id(&request_id).await {
    let status = existing.status().await;
    return Ok(SubmitQueryResponse { query_id: existing.id.clone(), status });
  }

  let job = state.store.create(request_id).await;
  tracing::info!(query_id = %job.id, "submitted query");

  let engine = state.engine.clone();
  let job_for_task = job.clone();
  let running = state.running_queries.clone();
  tokio::spawn(async move {
    run_job(job_for_task, engine, sql, running).await;
  });

  Ok(SubmitQueryResponse { query_id: job.id.clone(), status: Status::Queued })
}

async fn run_job(
  job: Arc<QueryJob>,
  engine: Engine,
  sql: String,
  running_gauge: Arc<std::sync::atomic::AtomicI64>,
) {
  job.mark_running().await;
  running_gauge.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

  let table = result_table_name(&job.id);
  let cancel = job.cancel.clone();
  let outcome = run_create_table(&engine, table.clone(), sql, cancel).await;

  match outcome {
    Ok(()) => match finalize_success(&engine, &table).await {
      Ok((columns, row_count)) => {
        job.mark_succeeded(table, columns, row_count).await;
        tracing::info!(query_id = %job.id, "query succeeded");
      }
      Err(e) => {
        job.mark_failed(format!("post-execution introspection failed: {e}")).await;
        tracing::warn!(query_id = %job.id, "introspection failed: {e}");
      }
    },
    Err(JobError::Canceled) => {
      job.mark_canceled("canceled".to_string()).await;
      tracing::info!(query_id = %job.id, "query canceled");
    }
    Err(JobError::Engine(e)) => {
      job.mark_failed(e.to_string()).await;
      tracing::warn!(query_id = %job.id, "query failed: {e}");
    }
  }

  running_gauge.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
}

enum JobError {
  Canceled,
  Engine(sql_engine::EngineError),
}

/// Runs `CREATE TABLE <table> AS <sql>` to completion, racing it against the
/// job's cancellation signal. If canceled first, interrupts the DuckDB
/// connection so the blocking call unwinds instead of running to
/// completion; the background task then reports CANCELED rather than
/// whatever error DuckDB raises for an interrupted query.
async fn run_create_table(
  engine: &Engine,
  table: String,
  sql: String,
  cancel: tokio_util::sync::CancellationToken,
) -> Result<(), JobError> {
  let conn = engine.get().map_err(JobError::Engine)?;
  let interrupt_handle = conn.interrupt_handle();

  let watcher_cancel = cancel.clone();
  let watcher = tokio::spawn(async move {
    watcher_cancel.cancelled().await;
    interrupt_handle.interrupt();
  });

  let result = tokio::task::spawn_blocking(move || sql_engine::create_table_as(&conn, &table, &sql))
    .await
    .map_err(|_| JobError::Engine(sql_engine::EngineError::Interrupted))
    .and_then(|r| r.map_err(JobError::Engine));

  watcher.abort();

  match result {
    Ok(()) => Ok(()),
    Err(JobError::Engine(_)) if cancel.is_cancelled() => Err(JobError::Canceled),
    other => other,
  }
}

async fn finalize_success(
  engine: &Engine,
  table: &str,
) -> Result<(Vec<String>, i64), sql_engine::EngineError> {
  let engine = engine.clone();
  let table = table.to_string();
  tokio::task::spawn_blocking(move || {
    let conn = engine.get()?;
    let columns = sql_engine::table_columns(&conn, &table)?;
    // A SubmitQuery that ran DDL (no SELECT-shaped result) reports
    // SUCCEEDED with empty columns and row_count = 0.
    let row_count = if columns.is_empty() { 0 } else { sql_engine::table_row_count(&conn, &table)? };
    Ok((columns, row_count))
  })
  .await
  .unwrap_or_else(|_| Err(sql_engine::EngineError::Interrupted))
}

pub async fn get_query_status(
  state: &AgentState,
  query_id: &str,
  request_id: &str,
) -> Result<GetQueryStatusResponse, AgentError> {
  let job = state
    .store
    .get(query_id)
    .await
    .ok_or_else(|| AgentError::new(ErrorCode::NotFound, format!("no such query {query_id:?}"), request_id))?;
  let snapshot = job.snapshot().await;
  Ok(snapshot_to_status_response(&snapshot))
}

fn snapshot_to_status_response(snapshot: &JobSnapshot) -> GetQueryStatusResponse {
  let succeeded = snapshot.status == Status::Succeeded;
  GetQueryStatusResponse {
    query_id: snapshot.id.clone(),
    status: snapshot.status,
    columns: succeeded.then(|| snapshot.columns.clone().unwrap_or_default()),
    row_count: succeeded.then_some(snapshot.row_count.unwrap_or(0)),
    error: snapshot.error.clone(),
    completed_at_unix_ms: snapshot.completed_at.map(|t| t.timestamp_millis()),
  }
}

pub async fn fetch_query_results(
  state: &AgentState,
  query_id: &str,
  page_token: Option<&str>,
  max_results: Option<i32>,
  request_id: &str,
) -> Result<FetchQueryResultsResponse, AgentError> {
  let job = state
    .store
    .get(query_id)
    .await
    .ok_or_else(|| AgentError::new(ErrorCode::NotFound, format!("no such query {query_id:?}"), request_id))?;
  let snapshot = job.snapshot().await;

  match snapshot.status {
    Status::Queued | Status::Running => {
      return Err(AgentError::new(
        ErrorCode::FailedPrecondition,
        "query is not ready: still QUEUED or RUNNING",
        request_id,
      ));
    }
    Status::Failed | Status::Canceled => {
      let reason = snapshot.error.clone().unwrap_or_else(|| "query did not succeed".to_string());
      return Err(AgentError::new(ErrorCode::FailedPrecondition, reason, request_id));
    }
    Status::Succeeded => {}
  }

  let columns = snapshot.columns.clone().unwrap_or_default();
  let total_rows = snapshot.row_count.unwrap_or(0);
  let offset = page_token.map(page_token::decode).unwrap_or(0);
  let limit = i64::from(clamp_page_size(max_results, state.config.default_page_size));

  let rows: Vec<Row> = if columns.is_empty() || snapshot.result_table.is_empty() {
    Vec::new()
  } else {
    let engine = state.engine.clone();
    let table = snapshot.result_table.clone();
    let columns_for_query = columns.clone();
    tokio::task::spawn_blocking(move || {
      let conn = engine.get()?;
      sql_engine::select_page(&conn, &table, &columns_for_query, limit, offset)
    })
    .await
    .map_err(|e| AgentError::new(ErrorCode::ExecutionError, format!("paging task panicked: {e}"), request_id))?
    .map_err(|e| AgentError::new(ErrorCode::ExecutionError, e.to_string(), request_id))?
  };

  let next_offset = offset + limit;
  let next_page_token = if next_offset < total_rows { page_token::encode(next_offset) } else { String::new() };

  Ok(FetchQueryResultsResponse {
    query_id: snapshot.id,
    columns,
    row_count: rows.len() as i64,
    rows,
    next_page_token,
  })
}

pub async fn cancel_query(
  state: &AgentState,
  query_id: &str,
  request_id: &str,
) -> Result<QueryStatusResponse, AgentError> {
  let job = state
    .store
    .get(query_id)
    .await
    .ok_or_else(|| AgentError::new(ErrorCode::NotFound, format!("no such query {query_id:?}"), request_id))?;
  let status = job.status().await;
  if !status.is_terminal() {
    job.cancel.cancel();
  }
  Ok(QueryStatusResponse { query_id: job.id.clone(), status: job.status().await })
}

pub async fn delete_query(
  state: &AgentState,
  query_id: &str,
  request_id: &str,
) -> Result<QueryStatusResponse, AgentError> {
  let job = state
    .store
    .get(query_id)
    .await
    .ok_or_else(|| AgentError::new(ErrorCode::NotFound, format!("no such query {query_id:?}"), request_id))?;

  let status = job.status().await;
  if !status.is_terminal() {
    job.cancel.cancel();
  }
  let snapshot = job.snapshot().await;

  if !snapshot.result_table.is_empty() {
    let engine = state.engine.clone();
    let table = snapshot.result_table.clone();
    let _ = tokio::task::spawn_blocking(move || {
      let conn = engine.get()?;
      sql_engine::drop_table_if_exists(&conn, &table)
    })
    .await;
  }

  state.store.delete(query_id).await;
  Ok(QueryStatusResponse { query_id: query_id.to_string(), status: snapshot.status })
}

/// Legacy one-shot path: runs `sql` inline to completion and returns every
/// row in the response. No job is recorded in the store.
pub async fn execute(
  state: &AgentState,
  sql: String,
  request_id: String,
) -> Result<ExecuteResponse, AgentError> {
  if sql.trim().is_empty() {
    return Err(AgentError::new(ErrorCode::InvalidArgument, "sql must not be empty", request_id));
  }
  let engine = state.engine.clone();
  let table = format!("_execute_{}", uuid::Uuid::new_v4().simple());
  let request_id_for_err = request_id.clone();
  let result = tokio::task::spawn_blocking({
    let table = table.clone();
    move || -> Result<(Vec<String>, Vec<Row>, i64), sql_engine::EngineError> {
      let conn = engine.get()?;
      sql_engine::create_table_as(&conn, &table, &sql)?;
      let columns = sql_engine::table_columns(&conn, &table)?;
      let row_count = if columns.is_empty() { 0 } else { sql_engine::table_row_count(&conn, &table)? };
      let rows = if columns.is_empty() {
        Vec::new()
      } else {
        sql_engine::select_page(&conn, &table, &columns, row_count, 0)?
      };
      sql_engine::drop_table_if_exists(&conn, &table)?;
      Ok((columns, rows, row_count))
    }
  })
  .await
  .map_err(|e| AgentError::new(ErrorCode::ExecutionError, format!("execute task panicked: {e}"), request_id_for_err.clone()))?;

  match result {
    Ok((columns, rows, row_count)) => Ok(ExecuteResponse { columns, rows, row_count, request_id }),
    Err(e) => Err(AgentError::new(ErrorCode::ExecutionError, e.to_string(), request_id)),
  }
}

/// Builds the unauthenticated `Health` snapshot shared by the HTTP and gRPC
/// surfaces: store counters plus the engine's current memory usage.
pub async fn health(state: &AgentState) -> HealthResponse {
  let metrics = state.store.metrics().await;
  let engine = state.engine.clone();
  let memory_bytes = tokio::task::spawn_blocking(move || {
    let conn = engine.get()?;
    sql_engine::memory_usage_bytes(&conn)
  })
  .await
  .unwrap_or(Ok(0))
  .unwrap_or(0);

  HealthResponse {
    status: "ok".to_string(),
    uptime_secs: state.start_time.elapsed().as_secs() as i64,
    queued: metrics.queued,
    running: metrics.running,
    completed: metrics.completed,
    memory_bytes,
    result_ttl_secs: state.config.result_ttl_secs,
  }
}
