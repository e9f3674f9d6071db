//! Loads a small JSON directory snapshot (principals, endpoints,
//! assignments, group memberships) into an [`InMemoryDirectory`], so
//! `control resolve` has something to resolve against without standing up
//! a real metadata database — the core never ships one (see
//! `PrincipalRepository`/`AssignmentRepository`/`EndpointRepository`).

use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::Context;
use compute_resolver::{Assignment, ComputeEndpoint, InMemoryDirectory, Principal};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
  #[serde(default)]
  pub principals: Vec<Principal>,
  #[serde(default)]
  pub endpoints: Vec<ComputeEndpoint>,
  #[serde(default)]
  pub assignments: Vec<Assignment>,
  /// principal id -> group ids, in priority order.
  #[serde(default)]
  pub memberships: HashMap<String, Vec<String>>,
}

pub async fn load(path: &Path) -> anyhow::Result<Arc<InMemoryDirectory>> {
  let text = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("reading directory seed file {}", path.display()))?;
  let seed: SeedFile = serde_json::from_str(&text)
    .with_context(|| format!("parsing directory seed file {}", path.display()))?;

  let directory = Arc::new(InMemoryDirectory::new());
  for principal in seed.principals {
    directory.put_principal(principal).await;
  }
  for endpoint in seed.endpoints {
    directory.put_endpoint(endpoint).await;
  }
  for assignment in seed.assignments {
    directory.put_assignment(assignment).await;
  }
  for (principal_id, group_ids) in seed.memberships {
    directory.put_membership(&principal_id, group_ids).await;
  }
  Ok(directory)
}
