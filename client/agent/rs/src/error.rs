/// Errors surfaced by [`crate::transport::Transport`] and
/// [`crate::executor::RemoteExecutor`]. The lifecycle-unsupported variants
/// are distinguished from every other failure because the executor treats
/// them specially: a fresh endpoint that has no lifecycle surface falls
/// back to `Execute` instead of failing the caller's query.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
  #[error("http transport: {0}")]
  Http(#[from] reqwest::Error),

  #[error("agent returned {status}: {body}")]
  HttpStatus { status: u16, body: wire::AgentError },

  #[error("grpc transport: {0}")]
  Grpc(#[from] tonic::Status),

  #[error("signing request: {0}")]
  Signing(#[from] signing::SigningError),

  #[error("materializing remote result: {0}")]
  Engine(#[from] sql_engine::EngineError),

  #[error("invalid endpoint url: {0}")]
  InvalidUrl(String),

  #[error("query {query_id} failed: {reason}")]
  QueryFailed { query_id: String, reason: String },

  #[error("query {query_id} was canceled: {reason}")]
  QueryCanceled { query_id: String, reason: String },
}

impl ClientError {
  /// True when the failure indicates the endpoint has no lifecycle surface
  /// at all (a worker running only the legacy `Execute` RPC), as opposed to
  /// a real failure of a lifecycle call that happens to exist.
  pub fn is_lifecycle_unsupported(&self) -> bool {
    match self {
      ClientError::HttpStatus { status, .. } => *status == 404 || *status == 405,
      ClientError::Grpc(status) => matches!(
        status.code(),
        tonic::Code::Unimplemented | tonic::Code::Unavailable | tonic::Code::DeadlineExceeded
      ),
      _ => false,
    }
  }
}
