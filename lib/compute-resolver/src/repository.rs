use crate::types::{Assignment, ComputeEndpoint, Principal, PrincipalKind};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
  #[error("not found")]
  NotFound,
  #[error("repository backend error: {0}")]
  Backend(#[from] anyhow::Error),
}

#[async_trait::async_trait]
pub trait PrincipalRepository: Send + Sync {
  async fn find_by_name(&self, name: &str) -> Result<Principal, RepositoryError>;
  /// Groups the principal belongs to, in the repository's own priority
  /// order (first hit wins when resolving an assignment).
  async fn groups_of(&self, principal_id: &str) -> Result<Vec<Principal>, RepositoryError>;
}

#[async_trait::async_trait]
pub trait AssignmentRepository: Send + Sync {
  async fn find_default(
    &self,
    principal_id: &str,
    principal_kind: PrincipalKind,
  ) -> Result<Assignment, RepositoryError>;
}

#[async_trait::async_trait]
pub trait EndpointRepository: Send + Sync {
  async fn find_by_id(&self, id: &str) -> Result<ComputeEndpoint, RepositoryError>;
}
