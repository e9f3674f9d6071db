//! Control-plane client for a compute agent: picks a transport from an
//! endpoint URL, drives the query lifecycle protocol (falling back to the
//! legacy one-shot `Execute` RPC against agents that don't speak it), and
//! materializes the remote result set into a local staging relation so
//! callers get an ordinary row cursor regardless of where the query ran.

pub mod error;
pub mod executor;
pub mod transport;

pub use error::ClientError;
pub use executor::{LocalExecutor, QueryContext, RemoteExecutor};
pub use transport::Transport;
