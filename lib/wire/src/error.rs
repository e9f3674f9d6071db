use serde::{Deserialize, Serialize};

/// Error taxonomy shared across both transports (§7 of the design).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
  AuthError,
  InvalidArgument,
  ParseError,
  NotFound,
  FailedPrecondition,
  Unimplemented,
  ExecutionError,
}

impl ErrorCode {
  pub fn http_status(self) -> u16 {
    match self {
      ErrorCode::AuthError => 401,
      ErrorCode::InvalidArgument | ErrorCode::ParseError => 400,
      ErrorCode::NotFound => 404,
      ErrorCode::FailedPrecondition => 412,
      ErrorCode::Unimplemented => 501,
      ErrorCode::ExecutionError => 500,
    }
  }

  pub fn grpc_code(self) -> tonic::Code {
    match self {
      ErrorCode::AuthError => tonic::Code::Unauthenticated,
      ErrorCode::InvalidArgument => tonic::Code::InvalidArgument,
      ErrorCode::ParseError => tonic::Code::InvalidArgument,
      ErrorCode::NotFound => tonic::Code::NotFound,
      ErrorCode::FailedPrecondition => tonic::Code::FailedPrecondition,
      ErrorCode::Unimplemented => tonic::Code::Unimplemented,
      ErrorCode::ExecutionError => tonic::Code::Internal,
    }
  }

  pub fn from_grpc_code(code: tonic::Code) -> Self {
    match code {
      tonic::Code::Unauthenticated | tonic::Code::PermissionDenied => {
        ErrorCode::AuthError
      }
      tonic::Code::InvalidArgument => ErrorCode::InvalidArgument,
      tonic::Code::NotFound => ErrorCode::NotFound,
      tonic::Code::FailedPrecondition => ErrorCode::FailedPrecondition,
      tonic::Code::Unimplemented | tonic::Code::Unavailable => {
        ErrorCode::Unimplemented
      }
      _ => ErrorCode::ExecutionError,
    }
  }
}

/// The uniform JSON error body returned by every HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code:?}: {error}")]
pub struct AgentError {
  pub error: String,
  pub code: ErrorCode,
  pub request_id: String,
}

impl AgentError {
  pub fn new(
    code: ErrorCode,
    error: impl Into<String>,
    request_id: impl Into<String>,
  ) -> Self {
    AgentError { error: error.into(), code, request_id: request_id.into() }
  }
}
