//! Library surface so `tests/` can exercise the HTTP router and lifecycle
//! engine directly, the way the teacher's own crates split a thin `main.rs`
//! from a testable library.

pub mod config;
pub mod grpc;
pub mod http;
pub mod lifecycle;
pub mod state;
pub mod store;
