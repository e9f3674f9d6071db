use std::{
  sync::{Arc, atomic::AtomicI64},
  time::{Duration, Instant},
};

use sql_engine::{DuckDbConnectionManager, Engine};

use crate::config::AgentConfig;
use crate::store::Store;

/// Shared state handed to every HTTP and gRPC handler: the query store, the
/// embedded engine handle, config, and the process start time (for
/// `Health`'s uptime).
#[derive(Clone)]
pub struct AgentState {
  pub store: Arc<Store>,
  pub engine: Engine,
  pub config: &'static AgentConfig,
  pub start_time: Instant,
  pub running_queries: Arc<AtomicI64>,
}

impl AgentState {
  pub fn new(config: &'static AgentConfig) -> anyhow::Result<Self> {
    let manager = DuckDbConnectionManager::memory()?;
    let pool = r2d2::Pool::builder().build(manager)?;
    let engine = Engine::new(pool);

    if let Some(limit) = &config.memory_limit {
      let conn = engine.get()?;
      sql_engine::execute_statement(&conn, &format!("SET memory_limit='{limit}'"))?;
    }

    let ttl = Duration::from_secs(config.result_ttl_secs.max(0) as u64);
    let sweep_interval = Duration::from_secs(config.cleanup_interval_secs);
    let store = Arc::new(Store::new(ttl, sweep_interval));

    Ok(AgentState {
      store,
      engine,
      config,
      start_time: Instant::now(),
      running_queries: Arc::new(AtomicI64::new(0)),
    })
  }
}
