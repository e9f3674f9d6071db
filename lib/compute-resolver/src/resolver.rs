use std::sync::Arc;

use agent_client::{LocalExecutor, RemoteExecutor, Transport};
use cache::CloneCache;
use sql_engine::Engine;

use crate::repository::{AssignmentRepository, EndpointRepository, PrincipalRepository, RepositoryError};
use crate::types::{EndpointKind, PrincipalKind};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
  #[error("endpoint {endpoint_id} is unhealthy: {source}")]
  EndpointUnhealthy {
    endpoint_id: String,
    #[source]
    source: agent_client::ClientError,
  },
  #[error("repository: {0}")]
  Repository(#[from] RepositoryError),
  #[error("constructing remote executor: {0}")]
  Client(#[from] agent_client::ClientError),
}

/// Either executor a resolved principal routes to. Cloning is cheap: both
/// variants wrap `Arc`-backed handles.
#[derive(Clone)]
pub enum Executor {
  Local(Arc<LocalExecutor>),
  Remote(Arc<RemoteExecutor>),
}

/// Maps a principal name to the executor it should use, or `None` to mean
/// "run locally" (no repositories wired, or the principal has no
/// assignment anywhere). Remote executors are cached one-per-endpoint-id
/// behind a double-checked-locking cache so concurrent callers share a
/// single connection pool per endpoint.
pub struct Resolver {
  principals: Option<Arc<dyn PrincipalRepository>>,
  assignments: Option<Arc<dyn AssignmentRepository>>,
  endpoints: Option<Arc<dyn EndpointRepository>>,
  local: Arc<LocalExecutor>,
  remote_cache: CloneCache<String, Arc<RemoteExecutor>>,
  staging_engine: Engine,
}

impl Resolver {
  pub fn new(local_engine: Engine, staging_engine: Engine) -> Self {
    Resolver {
      principals: None,
      assignments: None,
      endpoints: None,
      local: Arc::new(LocalExecutor::new(local_engine)),
      remote_cache: CloneCache::default(),
      staging_engine,
    }
  }

  pub fn with_repositories(
    mut self,
    principals: Arc<dyn PrincipalRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    endpoints: Arc<dyn EndpointRepository>,
  ) -> Self {
    self.principals = Some(principals);
    self.assignments = Some(assignments);
    self.endpoints = Some(endpoints);
    self
  }

  /// Resolves `principal_name` to the executor the caller should use.
  /// `None` means "no resolver configured or no assignment found — run
  /// locally."
  pub async fn resolve(&self, principal_name: &str) -> Result<Option<Executor>, ResolveError> {
    let (Some(principals), Some(assignments), Some(endpoints)) =
      (&self.principals, &self.assignments, &self.endpoints)
    else {
      return Ok(None);
    };

    let principal = match principals.find_by_name(principal_name).await {
      Ok(p) => p,
      Err(RepositoryError::NotFound) => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let assignment = match assignments.find_default(&principal.id, principal.kind).await {
      Ok(a) => Some(a),
      Err(RepositoryError::NotFound) => {
        if principal.kind == PrincipalKind::User {
          self.first_group_assignment(principals.as_ref(), assignments.as_ref(), &principal.id).await?
        } else {
          None
        }
      }
      Err(e) => return Err(e.into()),
    };

    let Some(assignment) = assignment else {
      return Ok(None);
    };

    let endpoint = endpoints.find_by_id(&assignment.endpoint_id).await?;

    match endpoint.kind {
      EndpointKind::Local => Ok(Some(Executor::Local(self.local.clone()))),
      EndpointKind::Remote => {
        let executor = self
          .remote_cache
          .get_or_try_init(&endpoint.id, || async {
            let transport = Transport::from_url(&endpoint.url, endpoint.auth_token.clone())
              .map_err(ResolveError::Client)?;
            Ok::<_, ResolveError>(Arc::new(RemoteExecutor::new(transport, self.staging_engine.clone())))
          })
          .await?;
        executor.ping().await.map_err(|source| ResolveError::EndpointUnhealthy {
          endpoint_id: endpoint.id.clone(),
          source,
        })?;
        Ok(Some(Executor::Remote(executor)))
      }
    }
  }

  async fn first_group_assignment(
    &self,
    principals: &dyn PrincipalRepository,
    assignments: &dyn AssignmentRepository,
    principal_id: &str,
  ) -> Result<Option<crate::types::Assignment>, ResolveError> {
    for group in principals.groups_of(principal_id).await? {
      match assignments.find_default(&group.id, PrincipalKind::Group).await {
        Ok(a) => return Ok(Some(a)),
        Err(RepositoryError::NotFound) => continue,
        Err(e) => return Err(e.into()),
      }
    }
    Ok(None)
  }
}
