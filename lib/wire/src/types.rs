use serde::{Deserialize, Serialize};

use crate::{proto, status::Status};

pub const DEFAULT_PAGE_SIZE: i32 = 500;
pub const MAX_PAGE_SIZE: i32 = 5000;

/// One result row: a value per column, nulls preserved, non-null scalars
/// rendered as their lossless textual form.
pub type Row = Vec<Option<String>>;

pub fn row_to_proto(row: &Row) -> proto::Row {
  proto::Row {
    values: row
      .iter()
      .map(|v| proto::Value { value: v.clone() })
      .collect(),
  }
}

pub fn row_from_proto(row: proto::Row) -> Row {
  row.values.into_iter().map(|v| v.value).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
  pub sql: String,
  pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
  pub columns: Vec<String>,
  pub rows: Vec<Row>,
  pub row_count: i64,
  pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQueryRequest {
  pub sql: String,
  pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQueryResponse {
  pub query_id: String,
  pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetQueryStatusResponse {
  pub query_id: String,
  pub status: Status,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub columns: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub row_count: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed_at_unix_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchQueryResultsQuery {
  pub page_token: Option<String>,
  pub max_results: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchQueryResultsResponse {
  pub query_id: String,
  pub columns: Vec<String>,
  pub rows: Vec<Row>,
  pub row_count: i64,
  #[serde(skip_serializing_if = "String::is_empty", default)]
  pub next_page_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStatusResponse {
  pub query_id: String,
  pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
  pub status: String,
  pub uptime_secs: i64,
  pub queued: i64,
  pub running: i64,
  pub completed: i64,
  pub memory_bytes: i64,
  pub result_ttl_secs: i64,
}

/// Clamps a caller-supplied `max_results` to `(0, MAX_PAGE_SIZE]`,
/// substituting `default_page_size` (the deployment's configured default,
/// normally [`DEFAULT_PAGE_SIZE`]) when absent.
pub fn clamp_page_size(requested: Option<i32>, default_page_size: i32) -> i32 {
  requested
    .filter(|n| *n > 0)
    .unwrap_or(default_page_size)
    .min(MAX_PAGE_SIZE)
}
