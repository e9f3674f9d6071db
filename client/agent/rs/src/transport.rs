use wire::proto;
use wire::proto::agent_service_client::AgentServiceClient;
use wire::types::{
  ExecuteRequest, ExecuteResponse, FetchQueryResultsResponse, GetQueryStatusResponse,
  QueryStatusResponse, Row, SubmitQueryRequest, SubmitQueryResponse,
};

use crate::error::ClientError;

/// Picks the wire transport from a `ComputeEndpoint` URL's scheme:
/// `http`/`https` speak JSON over `reqwest`, `grpc`/`grpc+tls` speak the
/// generated `tonic` service. Both carry the same logical request/response
/// shapes.
pub enum Transport {
  Http(HttpTransport),
  Grpc(GrpcTransport),
}

impl Transport {
  pub fn from_url(url: &str, token: String) -> Result<Self, ClientError> {
    let parsed = url::Url::parse(url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
      "http" | "https" => Ok(Transport::Http(HttpTransport::new(parsed, token))),
      "grpc" | "grpc+tls" => Ok(Transport::Grpc(GrpcTransport::new(parsed, token)?)),
      other => Err(ClientError::InvalidUrl(format!("unsupported scheme {other:?}"))),
    }
  }

  pub async fn execute(&self, sql: &str, request_id: &str) -> Result<ExecuteResponse, ClientError> {
    match self {
      Transport::Http(t) => t.execute(sql, request_id).await,
      Transport::Grpc(t) => t.execute(sql, request_id).await,
    }
  }

  pub async fn submit_query(
    &self,
    sql: &str,
    request_id: &str,
  ) -> Result<SubmitQueryResponse, ClientError> {
    match self {
      Transport::Http(t) => t.submit_query(sql, request_id).await,
      Transport::Grpc(t) => t.submit_query(sql, request_id).await,
    }
  }

  pub async fn get_query_status(
    &self,
    query_id: &str,
  ) -> Result<GetQueryStatusResponse, ClientError> {
    match self {
      Transport::Http(t) => t.get_query_status(query_id).await,
      Transport::Grpc(t) => t.get_query_status(query_id).await,
    }
  }

  pub async fn fetch_query_results(
    &self,
    query_id: &str,
    page_token: &str,
    max_results: i32,
  ) -> Result<FetchQueryResultsResponse, ClientError> {
    match self {
      Transport::Http(t) => t.fetch_query_results(query_id, page_token, max_results).await,
      Transport::Grpc(t) => t.fetch_query_results(query_id, page_token, max_results).await,
    }
  }

  pub async fn cancel_query(&self, query_id: &str) -> Result<QueryStatusResponse, ClientError> {
    match self {
      Transport::Http(t) => t.cancel_query(query_id).await,
      Transport::Grpc(t) => t.cancel_query(query_id).await,
    }
  }

  pub async fn delete_query(&self, query_id: &str) -> Result<QueryStatusResponse, ClientError> {
    match self {
      Transport::Http(t) => t.delete_query(query_id).await,
      Transport::Grpc(t) => t.delete_query(query_id).await,
    }
  }

  pub async fn ping(&self) -> Result<(), ClientError> {
    match self {
      Transport::Http(t) => t.ping().await,
      Transport::Grpc(t) => t.ping().await,
    }
  }
}

pub struct HttpTransport {
  base_url: url::Url,
  token: String,
  client: reqwest::Client,
}

impl HttpTransport {
  fn new(base_url: url::Url, token: String) -> Self {
    HttpTransport { base_url, token, client: reqwest::Client::new() }
  }

  fn signed_request(
    &self,
    method: reqwest::Method,
    path: &str,
    body: &[u8],
  ) -> Result<reqwest::RequestBuilder, ClientError> {
    let timestamp = chrono::Utc::now().to_rfc3339();
    let signature = signing::sign(&self.token, method.as_str(), path, &timestamp, body)?;
    let url = self
      .base_url
      .join(path)
      .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
    Ok(
      self
        .client
        .request(method, url)
        .header("x-agent-timestamp", timestamp)
        .header("x-agent-signature", signature)
        .header("content-type", "application/json"),
    )
  }

  async fn send<T: serde::de::DeserializeOwned>(
    req: reqwest::RequestBuilder,
  ) -> Result<T, ClientError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp
        .json::<wire::AgentError>()
        .await
        .unwrap_or_else(|_| wire::AgentError::new(wire::ErrorCode::ExecutionError, "unreadable error body", ""));
      return Err(ClientError::HttpStatus { status: status.as_u16(), body });
    }
    Ok(resp.json::<T>().await?)
  }

  async fn execute(&self, sql: &str, request_id: &str) -> Result<ExecuteResponse, ClientError> {
    let payload = ExecuteRequest { sql: sql.to_string(), request_id: request_id.to_string() };
    let body = serde_json::to_vec(&payload).unwrap_or_default();
    let req = self.signed_request(reqwest::Method::POST, "/execute", &body)?.body(body);
    Self::send(req).await
  }

  async fn submit_query(
    &self,
    sql: &str,
    request_id: &str,
  ) -> Result<SubmitQueryResponse, ClientError> {
    let payload = SubmitQueryRequest { sql: sql.to_string(), request_id: request_id.to_string() };
    let body = serde_json::to_vec(&payload).unwrap_or_default();
    let req = self.signed_request(reqwest::Method::POST, "/queries", &body)?.body(body);
    Self::send(req).await
  }

  async fn get_query_status(&self, query_id: &str) -> Result<GetQueryStatusResponse, ClientError> {
    let path = format!("/queries/{query_id}");
    let req = self.signed_request(reqwest::Method::GET, &path, b"")?;
    Self::send(req).await
  }

  async fn fetch_query_results(
    &self,
    query_id: &str,
    page_token: &str,
    max_results: i32,
  ) -> Result<FetchQueryResultsResponse, ClientError> {
    let path = format!(
      "/queries/{query_id}/results?page_token={}&max_results={max_results}",
      urlencoding_minimal(page_token)
    );
    let req = self.signed_request(reqwest::Method::GET, &path, b"")?;
    Self::send(req).await
  }

  async fn cancel_query(&self, query_id: &str) -> Result<QueryStatusResponse, ClientError> {
    let path = format!("/queries/{query_id}/cancel");
    let req = self.signed_request(reqwest::Method::POST, &path, b"")?;
    Self::send(req).await
  }

  async fn delete_query(&self, query_id: &str) -> Result<QueryStatusResponse, ClientError> {
    let path = format!("/queries/{query_id}");
    let req = self.signed_request(reqwest::Method::DELETE, &path, b"")?;
    Self::send(req).await
  }

  async fn ping(&self) -> Result<(), ClientError> {
    let req = self.signed_request(reqwest::Method::GET, "/health", b"")?;
    let _: wire::types::HealthResponse = Self::send(req).await?;
    Ok(())
  }
}

/// Minimal query-string escaping sufficient for the base64 alphabet a page
/// token is drawn from (`+` is the only reserved character it can contain).
fn urlencoding_minimal(value: &str) -> String {
  value.replace('+', "%2B")
}

pub struct GrpcTransport {
  token: String,
  client: AgentServiceClient<tonic::transport::Channel>,
}

impl GrpcTransport {
  fn new(url: url::Url, token: String) -> Result<Self, ClientError> {
    let authority = format!(
      "http://{}:{}",
      url.host_str().ok_or_else(|| ClientError::InvalidUrl("missing host".into()))?,
      url.port().unwrap_or(443)
    );
    let channel = tonic::transport::Endpoint::from_shared(authority)
      .map_err(|e| ClientError::InvalidUrl(e.to_string()))?
      .connect_lazy();
    Ok(GrpcTransport { token, client: AgentServiceClient::new(channel) })
  }

  fn authed<T>(&self, message: T) -> tonic::Request<T> {
    let mut req = tonic::Request::new(message);
    if let Ok(value) = self.token.parse() {
      req.metadata_mut().insert("x-agent-token", value);
    }
    req
  }

  async fn execute(&self, sql: &str, request_id: &str) -> Result<ExecuteResponse, ClientError> {
    let mut client = self.client.clone();
    let req = self.authed(proto::ExecuteRequest {
      sql: sql.to_string(),
      request_id: request_id.to_string(),
    });
    let resp = client.execute(req).await?.into_inner();
    Ok(ExecuteResponse {
      columns: resp.columns,
      rows: resp.rows.into_iter().map(wire::types::row_from_proto).collect(),
      row_count: resp.row_count,
      request_id: resp.request_id,
    })
  }

  async fn submit_query(
    &self,
    sql: &str,
    request_id: &str,
  ) -> Result<SubmitQueryResponse, ClientError> {
    let mut client = self.client.clone();
    let req = self.authed(proto::SubmitQueryRequest {
      sql: sql.to_string(),
      request_id: request_id.to_string(),
    });
    let resp = client.submit_query(req).await?.into_inner();
    Ok(SubmitQueryResponse {
      query_id: resp.query_id,
      status: proto::QueryStatus::try_from(resp.status).unwrap_or(proto::QueryStatus::Queued).into(),
    })
  }

  async fn get_query_status(&self, query_id: &str) -> Result<GetQueryStatusResponse, ClientError> {
    let mut client = self.client.clone();
    let req = self.authed(proto::GetQueryStatusRequest { query_id: query_id.to_string() });
    let resp = client.get_query_status(req).await?.into_inner();
    Ok(GetQueryStatusResponse {
      query_id: resp.query_id,
      status: proto::QueryStatus::try_from(resp.status).unwrap_or(proto::QueryStatus::Queued).into(),
      columns: (!resp.columns.is_empty()).then_some(resp.columns),
      row_count: (resp.row_count > 0 || resp.has_completed_at).then_some(resp.row_count),
      error: (!resp.error.is_empty()).then_some(resp.error),
      completed_at_unix_ms: resp.has_completed_at.then_some(resp.completed_at_unix_ms),
    })
  }

  async fn fetch_query_results(
    &self,
    query_id: &str,
    page_token: &str,
    max_results: i32,
  ) -> Result<FetchQueryResultsResponse, ClientError> {
    let mut client = self.client.clone();
    let req = self.authed(proto::FetchQueryResultsRequest {
      query_id: query_id.to_string(),
      page_token: page_token.to_string(),
      max_results,
    });
    let resp = client.fetch_query_results(req).await?.into_inner();
    Ok(FetchQueryResultsResponse {
      query_id: resp.query_id,
      columns: resp.columns,
      rows: resp.rows.into_iter().map(wire::types::row_from_proto).collect::<Vec<Row>>(),
      row_count: resp.row_count,
      next_page_token: resp.next_page_token,
    })
  }

  async fn cancel_query(&self, query_id: &str) -> Result<QueryStatusResponse, ClientError> {
    let mut client = self.client.clone();
    let req = self.authed(proto::CancelQueryRequest { query_id: query_id.to_string() });
    let resp = client.cancel_query(req).await?.into_inner();
    Ok(QueryStatusResponse {
      query_id: resp.query_id,
      status: proto::QueryStatus::try_from(resp.status).unwrap_or(proto::QueryStatus::Queued).into(),
    })
  }

  async fn delete_query(&self, query_id: &str) -> Result<QueryStatusResponse, ClientError> {
    let mut client = self.client.clone();
    let req = self.authed(proto::DeleteQueryRequest { query_id: query_id.to_string() });
    let resp = client.delete_query(req).await?.into_inner();
    Ok(QueryStatusResponse {
      query_id: resp.query_id,
      status: proto::QueryStatus::try_from(resp.status).unwrap_or(proto::QueryStatus::Queued).into(),
    })
  }

  async fn ping(&self) -> Result<(), ClientError> {
    let mut client = self.client.clone();
    let req = self.authed(proto::HealthRequest {});
    client.health(req).await?;
    Ok(())
  }
}
