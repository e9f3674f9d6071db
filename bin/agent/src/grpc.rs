//! gRPc surface: the same lifecycle operations as the HTTP routes, behind
//! the generated `AgentService` trait. Message shapes are field-for-field
//! identical in semantics to the HTTP JSON bodies (see `wire::types`).

use tonic::{Request, Response, Status as GrpcStatus};
use wire::AgentError;
use wire::proto::{self, agent_service_server::AgentService};
use wire::types::row_to_proto;

use crate::lifecycle;
use crate::state::AgentState;

pub struct GrpcAgent {
  pub state: AgentState,
}

fn request_id_of<T>(req: &Request<T>) -> String {
  req
    .metadata()
    .get("x-request-id")
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_string()
}

fn check_token<T>(req: &Request<T>, state: &AgentState) -> Result<(), GrpcStatus> {
  let token = req.metadata().get("x-agent-token").and_then(|v| v.to_str().ok()).unwrap_or_default();
  if token != state.config.token {
    return Err(GrpcStatus::unauthenticated("missing or invalid x-agent-token"));
  }
  Ok(())
}

fn agent_error_to_status(err: AgentError) -> GrpcStatus {
  GrpcStatus::new(err.code.grpc_code(), err.error)
}

#[tonic::async_trait]
impl AgentService for GrpcAgent {
  async fn execute(
    &self,
    request: Request<proto::ExecuteRequest>,
  ) -> Result<Response<proto::ExecuteResponse>, GrpcStatus> {
    check_token(&request, &self.state)?;
    let req = request.into_inner();
    let resp = lifecycle::execute(&self.state, req.sql, req.request_id)
      .await
      .map_err(agent_error_to_status)?;
    Ok(Response::new(proto::ExecuteResponse {
      columns: resp.columns,
      rows: resp.rows.iter().map(row_to_proto).collect(),
      row_count: resp.row_count,
      request_id: resp.request_id,
    }))
  }

  async fn submit_query(
    &self,
    request: Request<proto::SubmitQueryRequest>,
  ) -> Result<Response<proto::SubmitQueryResponse>, GrpcStatus> {
    check_token(&request, &self.state)?;
    let req = request.into_inner();
    let resp = lifecycle::submit_query(&self.state, req.sql, req.request_id)
      .await
      .map_err(agent_error_to_status)?;
    Ok(Response::new(proto::SubmitQueryResponse {
      query_id: resp.query_id,
      status: proto::QueryStatus::from(resp.status) as i32,
    }))
  }

  async fn get_query_status(
    &self,
    request: Request<proto::GetQueryStatusRequest>,
  ) -> Result<Response<proto::GetQueryStatusResponse>, GrpcStatus> {
    check_token(&request, &self.state)?;
    let request_id = request_id_of(&request);
    let req = request.into_inner();
    let resp = lifecycle::get_query_status(&self.state, &req.query_id, &request_id)
      .await
      .map_err(agent_error_to_status)?;
    Ok(Response::new(proto::GetQueryStatusResponse {
      query_id: resp.query_id,
      status: proto::QueryStatus::from(resp.status) as i32,
      columns: resp.columns.unwrap_or_default(),
      row_count: resp.row_count.unwrap_or(0),
      error: resp.error.unwrap_or_default(),
      has_completed_at: resp.completed_at_unix_ms.is_some(),
      completed_at_unix_ms: resp.completed_at_unix_ms.unwrap_or(0),
    }))
  }

  async fn fetch_query_results(
    &self,
    request: Request<proto::FetchQueryResultsRequest>,
  ) -> Result<Response<proto::FetchQueryResultsResponse>, GrpcStatus> {
    check_token(&request, &self.state)?;
    let request_id = request_id_of(&request);
    let req = request.into_inner();
    let max_results = (req.max_results > 0).then_some(req.max_results);
    let resp = lifecycle::fetch_query_results(
      &self.state,
      &req.query_id,
      (!req.page_token.is_empty()).then_some(req.page_token.as_str()),
      max_results,
      &request_id,
    )
    .await
    .map_err(agent_error_to_status)?;
    Ok(Response::new(proto::FetchQueryResultsResponse {
      query_id: resp.query_id,
      columns: resp.columns,
      rows: resp.rows.iter().map(row_to_proto).collect(),
      row_count: resp.row_count,
      next_page_token: resp.next_page_token,
    }))
  }

  async fn cancel_query(
    &self,
    request: Request<proto::CancelQueryRequest>,
  ) -> Result<Response<proto::CancelQueryResponse>, GrpcStatus> {
    check_token(&request, &self.state)?;
    let request_id = request_id_of(&request);
    let req = request.into_inner();
    let resp = lifecycle::cancel_query(&self.state, &req.query_id, &request_id)
      .await
      .map_err(agent_error_to_status)?;
    Ok(Response::new(proto::CancelQueryResponse {
      query_id: resp.query_id,
      status: proto::QueryStatus::from(resp.status) as i32,
    }))
  }

  async fn delete_query(
    &self,
    request: Request<proto::DeleteQueryRequest>,
  ) -> Result<Response<proto::DeleteQueryResponse>, GrpcStatus> {
    check_token(&request, &self.state)?;
    let request_id = request_id_of(&request);
    let req = request.into_inner();
    let resp = lifecycle::delete_query(&self.state, &req.query_id, &request_id)
      .await
      .map_err(agent_error_to_status)?;
    Ok(Response::new(proto::DeleteQueryResponse {
      query_id: resp.query_id,
      status: proto::QueryStatus::from(resp.status) as i32,
    }))
  }

  async fn health(
    &self,
    _request: Request<proto::HealthRequest>,
  ) -> Result<Response<proto::HealthResponse>, GrpcStatus> {
    let resp = lifecycle::health(&self.state).await;
    Ok(Response::new(proto::HealthResponse {
      status: resp.status,
      uptime_secs: resp.uptime_secs,
      queued: resp.queued,
      running: resp.running,
      completed: resp.completed,
      memory_bytes: resp.memory_bytes,
      result_ttl_secs: resp.result_ttl_secs,
    }))
  }
}
