//! Shared request/response shapes and status enum for the agent lifecycle
//! protocol, usable identically from the HTTP/JSON surface and the
//! generated gRPC surface.

pub mod error;
pub mod page_token;
pub mod status;
pub mod types;

pub mod proto {
  tonic::include_proto!("agent");
}

pub use error::{AgentError, ErrorCode};
pub use status::Status;
