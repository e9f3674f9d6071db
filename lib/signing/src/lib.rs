//! Shared-secret HMAC-SHA256 request signing for the agent HTTP surface.
//!
//! Canonical string: `METHOD\nPATH\nTIMESTAMP\nSHA256(body)_hex`, HMAC'd
//! with the agent's shared token. Timestamps are RFC3339 UTC. Verification
//! rejects a timestamp outside the configured skew window, and compares the
//! signature in constant time.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
  #[error("timestamp is not valid RFC3339: {0}")]
  InvalidTimestamp(#[from] chrono::ParseError),
  #[error("request timestamp skew {skew_secs}s exceeds max {max_skew_secs}s")]
  SkewExceeded { skew_secs: i64, max_skew_secs: i64 },
  #[error("signature does not match")]
  Mismatch,
  #[error("token is not a valid HMAC key")]
  InvalidKey,
}

fn body_digest_hex(body: &[u8]) -> String {
  hex::encode(Sha256::digest(body))
}

fn canonical_string(
  method: &str,
  path: &str,
  timestamp: &str,
  body: &[u8],
) -> String {
  format!("{method}\n{path}\n{timestamp}\n{}", body_digest_hex(body))
}

/// Computes the hex-encoded HMAC-SHA256 signature for a request.
pub fn sign(
  token: &str,
  method: &str,
  path: &str,
  timestamp: &str,
  body: &[u8],
) -> Result<String, SigningError> {
  let mut mac = HmacSha256::new_from_slice(token.as_bytes())
    .map_err(|_| SigningError::InvalidKey)?;
  mac.update(canonical_string(method, path, timestamp, body).as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a request signature, rejecting stale timestamps and using a
/// constant-time comparison for the HMAC itself.
pub fn verify(
  token: &str,
  method: &str,
  path: &str,
  timestamp: &str,
  body: &[u8],
  signature_hex: &str,
  max_skew_secs: i64,
) -> Result<(), SigningError> {
  let sent = chrono::DateTime::parse_from_rfc3339(timestamp)?
    .with_timezone(&chrono::Utc);
  let now = chrono::Utc::now();
  let skew_secs = (now - sent).num_seconds().abs();
  if skew_secs > max_skew_secs {
    return Err(SigningError::SkewExceeded { skew_secs, max_skew_secs });
  }

  let mut mac = HmacSha256::new_from_slice(token.as_bytes())
    .map_err(|_| SigningError::InvalidKey)?;
  mac.update(canonical_string(method, path, timestamp, body).as_bytes());
  let expected = hex::decode(signature_hex).map_err(|_| SigningError::Mismatch)?;
  mac.verify_slice(&expected).map_err(|_| SigningError::Mismatch)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips() {
    let token = "shared-secret";
    let ts = chrono::Utc::now().to_rfc3339();
    let body = br#"{"sql":"select 1"}"#;
    let sig = sign(token, "POST", "/queries", &ts, body).unwrap();
    verify(token, "POST", "/queries", &ts, body, &sig, 300).unwrap();
  }

  #[test]
  fn rejects_tampered_body() {
    let token = "shared-secret";
    let ts = chrono::Utc::now().to_rfc3339();
    let sig = sign(token, "POST", "/queries", &ts, b"original").unwrap();
    let err = verify(token, "POST", "/queries", &ts, b"tampered", &sig, 300)
      .unwrap_err();
    assert!(matches!(err, SigningError::Mismatch));
  }

  #[test]
  fn rejects_stale_timestamp() {
    let token = "shared-secret";
    let stale = (chrono::Utc::now() - chrono::Duration::seconds(600)).to_rfc3339();
    let body = b"body";
    let sig = sign(token, "GET", "/health", &stale, body).unwrap();
    let err = verify(token, "GET", "/health", &stale, body, &sig, 300)
      .unwrap_err();
    assert!(matches!(err, SigningError::SkewExceeded { .. }));
  }
}
