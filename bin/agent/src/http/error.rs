use axum::{Json, response::IntoResponse};
use wire::{AgentError, error::ErrorCode};

/// Local wrapper so this crate can implement `IntoResponse` for the shared
/// [`wire::AgentError`] body without running into the orphan rule.
pub struct ApiError(pub AgentError);

impl ApiError {
  pub fn unauthorized(error: impl Into<String>, request_id: String) -> Self {
    ApiError(AgentError::new(ErrorCode::AuthError, error, request_id))
  }

  pub fn bad_request(error: impl Into<String>, request_id: String) -> Self {
    ApiError(AgentError::new(ErrorCode::InvalidArgument, error, request_id))
  }
}

impl From<AgentError> for ApiError {
  fn from(value: AgentError) -> Self {
    ApiError(value)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> axum::response::Response {
    let status = axum::http::StatusCode::from_u16(self.0.code.http_status())
      .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(self.0)).into_response()
  }
}
