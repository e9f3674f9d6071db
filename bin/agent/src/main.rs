use std::time::Duration;

use anyhow::Context;
use compute_agent::{config, grpc::GrpcAgent, http, state::AgentState};
use tonic::transport::Server;
use wire::proto::agent_service_server::AgentServiceServer;

#[macro_use]
extern crate tracing;

/// Periodically sweeps expired terminal jobs. Runs on its own interval
/// independent of request traffic, matching `maybe_cleanup`'s rate-limit
/// guard — a burst of requests won't sweep more often than this ticks.
fn spawn_cleanup_loop(state: AgentState) {
  let interval_secs = state.config.cleanup_interval_secs.max(1);
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
      ticker.tick().await;
      state.store.maybe_cleanup(&state.engine).await;
    }
  });
}

async fn run() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let config = config::agent_config();
  logger::init(&config.logging)?;

  info!("compute-agent starting (http {}, grpc {})", config.http_bind, config.grpc_bind);

  let state = AgentState::new(config).context("initializing agent state")?;
  spawn_cleanup_loop(state.clone());

  let http_addr = config.http_bind.parse().context("invalid AGENT_HTTP_BIND")?;
  let http_state = state.clone();
  let http_server = tokio::spawn(async move {
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, http::app(http_state)).await?;
    anyhow::Ok(())
  });

  let grpc_addr = config.grpc_bind.parse().context("invalid AGENT_GRPC_BIND")?;
  let grpc_server = tokio::spawn(async move {
    Server::builder()
      .add_service(AgentServiceServer::new(GrpcAgent { state }))
      .serve(grpc_addr)
      .await?;
    anyhow::Ok(())
  });

  tokio::select! {
    res = http_server => { res??; }
    res = grpc_server => { res??; }
  }

  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  run().await
}
