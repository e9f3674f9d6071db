use axum::{
  body::Body,
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};

use crate::http::error::ApiError;
use crate::state::AgentState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers.get(name)?.to_str().ok()
}

/// Constant-time equality, used for the raw shared-token check (the HMAC
/// signature check below already compares in constant time internally via
/// `hmac::Mac::verify_slice`).
fn constant_time_eq(a: &str, b: &str) -> bool {
  if a.len() != b.len() {
    return false;
  }
  a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verifies `X-Agent-Token`, and when the agent is configured with a
/// signature skew window, `X-Agent-Timestamp` + `X-Agent-Signature` as
/// well. Buffers the request body so it can be hashed for the signature
/// and still reaches the handler afterwards.
pub async fn authenticate(
  State(state): State<AgentState>,
  request: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let request_id = header_str(request.headers(), "x-request-id").unwrap_or_default().to_string();
  let token = header_str(request.headers(), "x-agent-token").unwrap_or_default().to_string();

  if !constant_time_eq(&token, &state.config.token) {
    return Err(ApiError::unauthorized("missing or invalid X-Agent-Token", request_id));
  }

  let (parts, body) = request.into_parts();
  let bytes = axum::body::to_bytes(body, usize::MAX)
    .await
    .map_err(|e| ApiError::bad_request(format!("reading request body: {e}"), request_id.clone()))?;

  if let Some(max_skew) = state.config.signature_max_skew_secs {
    let timestamp = header_str(&parts.headers, "x-agent-timestamp")
      .ok_or_else(|| ApiError::unauthorized("missing X-Agent-Timestamp", request_id.clone()))?;
    let signature = header_str(&parts.headers, "x-agent-signature")
      .ok_or_else(|| ApiError::unauthorized("missing X-Agent-Signature", request_id.clone()))?;
    let path = parts
      .uri
      .path_and_query()
      .map(|pq| pq.as_str())
      .unwrap_or_else(|| parts.uri.path());

    signing::verify(&state.config.token, parts.method.as_str(), path, timestamp, &bytes, signature, max_skew)
      .map_err(|e| ApiError::unauthorized(format!("invalid request signature: {e}"), request_id.clone()))?;
  }

  let request = Request::from_parts(parts, Body::from(bytes));
  Ok(next.run(request).await)
}
