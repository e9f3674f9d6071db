use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::repository::{AssignmentRepository, EndpointRepository, PrincipalRepository, RepositoryError};
use crate::types::{Assignment, ComputeEndpoint, Principal, PrincipalKind};

/// In-memory repository set for tests and local (single-binary) operation.
/// No persistence: state lives only as long as the process does. Everything
/// is keyed by principal/endpoint id; `find_by_name` does a linear scan,
/// which is fine at the scale this implementation is meant for.
#[derive(Default)]
pub struct InMemoryDirectory {
  principals: RwLock<HashMap<String, Principal>>,
  /// principal id -> ordered group ids, matching `groups_of`'s
  /// first-hit-wins contract.
  memberships: RwLock<HashMap<String, Vec<String>>>,
  assignments: RwLock<HashMap<(String, PrincipalKind), Assignment>>,
  endpoints: RwLock<HashMap<String, ComputeEndpoint>>,
}

impl InMemoryDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn put_principal(&self, principal: Principal) {
    self.principals.write().await.insert(principal.id.clone(), principal);
  }

  pub async fn put_membership(&self, principal_id: &str, group_ids: Vec<String>) {
    self.memberships.write().await.insert(principal_id.to_string(), group_ids);
  }

  pub async fn put_assignment(&self, assignment: Assignment) {
    self
      .assignments
      .write()
      .await
      .insert((assignment.principal_id.clone(), assignment.principal_kind), assignment);
  }

  pub async fn put_endpoint(&self, endpoint: ComputeEndpoint) {
    self.endpoints.write().await.insert(endpoint.id.clone(), endpoint);
  }
}

#[async_trait::async_trait]
impl PrincipalRepository for InMemoryDirectory {
  async fn find_by_name(&self, name: &str) -> Result<Principal, RepositoryError> {
    self
      .principals
      .read()
      .await
      .values()
      .find(|p| p.name == name)
      .cloned()
      .ok_or(RepositoryError::NotFound)
  }

  async fn groups_of(&self, principal_id: &str) -> Result<Vec<Principal>, RepositoryError> {
    let memberships = self.memberships.read().await;
    let Some(group_ids) = memberships.get(principal_id) else {
      return Ok(Vec::new());
    };
    let principals = self.principals.read().await;
    Ok(group_ids.iter().filter_map(|id| principals.get(id).cloned()).collect())
  }
}

#[async_trait::async_trait]
impl AssignmentRepository for InMemoryDirectory {
  async fn find_default(
    &self,
    principal_id: &str,
    principal_kind: PrincipalKind,
  ) -> Result<Assignment, RepositoryError> {
    self
      .assignments
      .read()
      .await
      .get(&(principal_id.to_string(), principal_kind))
      .cloned()
      .ok_or(RepositoryError::NotFound)
  }
}

#[async_trait::async_trait]
impl EndpointRepository for InMemoryDirectory {
  async fn find_by_id(&self, id: &str) -> Result<ComputeEndpoint, RepositoryError> {
    self.endpoints.read().await.get(id).cloned().ok_or(RepositoryError::NotFound)
  }
}
