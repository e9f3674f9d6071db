//! Resolves a principal name to the executor the engine core should run a
//! query against: the shared local executor, or a cached remote executor
//! for whatever compute endpoint the principal (directly, or via group
//! membership) is assigned to. A principal with no resolver configured or
//! no assignment at all falls back to local execution.

pub mod memory;
pub mod repository;
pub mod resolver;
pub mod types;

pub use memory::InMemoryDirectory;
pub use repository::{AssignmentRepository, EndpointRepository, PrincipalRepository, RepositoryError};
pub use resolver::{Executor, ResolveError, Resolver};
pub use types::{Assignment, ComputeEndpoint, EndpointKind, EndpointStatus, Principal, PrincipalKind};

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use sql_engine::{DuckDbConnectionManager, Engine};

  use super::*;

  fn memory_engine() -> Engine {
    let manager = DuckDbConnectionManager::memory().expect("open in-memory duckdb");
    let pool = r2d2::Pool::builder().max_size(2).build(manager).expect("build pool");
    Engine::new(pool)
  }

  #[tokio::test]
  async fn no_repositories_resolves_to_local_fallback() {
    let resolver = Resolver::new(memory_engine(), memory_engine());
    let executor = resolver.resolve("anyone").await.expect("resolve");
    assert!(executor.is_none());
  }

  #[tokio::test]
  async fn unknown_principal_resolves_to_local_fallback() {
    let directory = Arc::new(InMemoryDirectory::new());
    let resolver = Resolver::new(memory_engine(), memory_engine()).with_repositories(
      directory.clone(),
      directory.clone(),
      directory,
    );
    let executor = resolver.resolve("ghost").await.expect("resolve");
    assert!(executor.is_none());
  }

  #[tokio::test]
  async fn user_with_no_assignment_falls_back_after_checking_groups() {
    let directory = Arc::new(InMemoryDirectory::new());
    directory
      .put_principal(Principal { id: "u1".into(), name: "ada".into(), kind: PrincipalKind::User })
      .await;
    let resolver = Resolver::new(memory_engine(), memory_engine()).with_repositories(
      directory.clone(),
      directory.clone(),
      directory,
    );
    let executor = resolver.resolve("ada").await.expect("resolve");
    assert!(executor.is_none());
  }

  #[tokio::test]
  async fn user_assigned_to_local_endpoint_routes_locally() {
    let directory = Arc::new(InMemoryDirectory::new());
    directory
      .put_principal(Principal { id: "u1".into(), name: "ada".into(), kind: PrincipalKind::User })
      .await;
    directory
      .put_endpoint(ComputeEndpoint {
        id: "ep1".into(),
        name: "local".into(),
        url: String::new(),
        auth_token: String::new(),
        kind: EndpointKind::Local,
        status: EndpointStatus::Active,
      })
      .await;
    directory
      .put_assignment(Assignment {
        principal_id: "u1".into(),
        principal_kind: PrincipalKind::User,
        endpoint_id: "ep1".into(),
      })
      .await;
    let resolver = Resolver::new(memory_engine(), memory_engine()).with_repositories(
      directory.clone(),
      directory.clone(),
      directory,
    );
    let executor = resolver.resolve("ada").await.expect("resolve");
    assert!(matches!(executor, Some(Executor::Local(_))));
  }

  #[tokio::test]
  async fn user_falls_through_to_group_assignment() {
    let directory = Arc::new(InMemoryDirectory::new());
    directory
      .put_principal(Principal { id: "u1".into(), name: "ada".into(), kind: PrincipalKind::User })
      .await;
    directory
      .put_principal(Principal { id: "g1".into(), name: "analytics".into(), kind: PrincipalKind::Group })
      .await;
    directory.put_membership("u1", vec!["g1".into()]).await;
    directory
      .put_endpoint(ComputeEndpoint {
        id: "ep1".into(),
        name: "local".into(),
        url: String::new(),
        auth_token: String::new(),
        kind: EndpointKind::Local,
        status: EndpointStatus::Active,
      })
      .await;
    directory
      .put_assignment(Assignment {
        principal_id: "g1".into(),
        principal_kind: PrincipalKind::Group,
        endpoint_id: "ep1".into(),
      })
      .await;
    let resolver = Resolver::new(memory_engine(), memory_engine()).with_repositories(
      directory.clone(),
      directory.clone(),
      directory,
    );
    let executor = resolver.resolve("ada").await.expect("resolve");
    assert!(matches!(executor, Some(Executor::Local(_))));
  }
}
