use axum::{
  Json,
  extract::{Path, Query, State},
  http::HeaderMap,
};

use wire::types::{
  ExecuteRequest, FetchQueryResultsQuery, HealthResponse, SubmitQueryRequest,
};

use crate::http::error::ApiError;
use crate::lifecycle;
use crate::state::AgentState;

fn request_id(headers: &HeaderMap) -> String {
  headers.get("x-request-id").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string()
}

pub async fn execute(
  State(state): State<AgentState>,
  headers: HeaderMap,
  Json(req): Json<ExecuteRequest>,
) -> Result<Json<wire::types::ExecuteResponse>, ApiError> {
  let _ = request_id(&headers);
  let resp = lifecycle::execute(&state, req.sql, req.request_id).await?;
  Ok(Json(resp))
}

pub async fn submit_query(
  State(state): State<AgentState>,
  headers: HeaderMap,
  Json(req): Json<SubmitQueryRequest>,
) -> Result<(axum::http::StatusCode, Json<wire::types::SubmitQueryResponse>), ApiError> {
  let _ = request_id(&headers);
  let resp = lifecycle::submit_query(&state, req.sql, req.request_id).await?;
  Ok((axum::http::StatusCode::ACCEPTED, Json(resp)))
}

pub async fn get_query_status(
  State(state): State<AgentState>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<wire::types::GetQueryStatusResponse>, ApiError> {
  let resp = lifecycle::get_query_status(&state, &id, &request_id(&headers)).await?;
  Ok(Json(resp))
}

pub async fn fetch_query_results(
  State(state): State<AgentState>,
  Path(id): Path<String>,
  Query(params): Query<FetchQueryResultsQuery>,
  headers: HeaderMap,
) -> Result<Json<wire::types::FetchQueryResultsResponse>, ApiError> {
  let resp = lifecycle::fetch_query_results(
    &state,
    &id,
    params.page_token.as_deref(),
    params.max_results,
    &request_id(&headers),
  )
  .await?;
  Ok(Json(resp))
}

pub async fn cancel_query(
  State(state): State<AgentState>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<wire::types::QueryStatusResponse>, ApiError> {
  let resp = lifecycle::cancel_query(&state, &id, &request_id(&headers)).await?;
  Ok(Json(resp))
}

pub async fn delete_query(
  State(state): State<AgentState>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<wire::types::QueryStatusResponse>, ApiError> {
  let resp = lifecycle::delete_query(&state, &id, &request_id(&headers)).await?;
  Ok(Json(resp))
}

pub async fn health(State(state): State<AgentState>) -> Json<HealthResponse> {
  Json(lifecycle::health(&state).await)
}
