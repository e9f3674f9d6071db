use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointKind {
  Local,
  Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointStatus {
  Active,
  Inactive,
  Starting,
}

/// A configured worker address plus the credentials needed to reach it.
/// `kind = Remote` implies `url` is non-empty; `kind = Local` routes
/// straight to the shared [`agent_client::LocalExecutor`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeEndpoint {
  pub id: String,
  pub name: String,
  pub url: String,
  pub auth_token: String,
  pub kind: EndpointKind,
  pub status: EndpointStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalKind {
  User,
  Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub id: String,
  pub name: String,
  pub kind: PrincipalKind,
}

/// A default-endpoint mapping for one principal (direct user mapping, or a
/// group mapping inherited through membership).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub principal_id: String,
  pub principal_kind: PrincipalKind,
  pub endpoint_id: String,
}
