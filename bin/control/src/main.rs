//! A small hand-written CLI for manually exercising the resolver/executor
//! stack against a running agent — the control plane proper is a
//! collaborator service this core does not build (see SPEC_FULL §1); this
//! is the `bin/cli`-shaped counterpart to it, minus the generated-from-
//! OpenAPI command surface the real product derives its CLI from.

mod config;
mod seed;

use std::path::PathBuf;

use agent_client::{LocalExecutor, QueryContext, RemoteExecutor, Transport};
use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::Table;
use compute_resolver::{Executor, Resolver};
use sql_engine::{DuckDbConnectionManager, Engine};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "control", about = "Compute resolver / executor CLI")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run SQL against an agent endpoint directly, bypassing the resolver.
  Query {
    /// Agent URL, e.g. http://localhost:8980 or grpc://localhost:8981
    #[arg(long)]
    endpoint: String,
    #[arg(long)]
    token: String,
    sql: String,
  },
  /// Resolve a principal name against a directory seed file, optionally
  /// running SQL against whatever executor it resolves to.
  Resolve {
    principal: String,
    /// JSON file describing principals/endpoints/assignments/memberships.
    #[arg(long)]
    directory: PathBuf,
    #[arg(long)]
    sql: Option<String>,
  },
}

fn memory_engine() -> anyhow::Result<Engine> {
  let manager = DuckDbConnectionManager::memory()?;
  let pool = r2d2::Pool::builder().build(manager)?;
  Ok(Engine::new(pool))
}

async fn drain_and_print(ctx: QueryContext) -> anyhow::Result<()> {
  const PAGE: i64 = 1000;
  let mut offset = 0_i64;
  let mut printed_header = false;
  let mut table = Table::new();
  table.set_header(ctx.columns.iter().cloned());
  loop {
    let rows = ctx.fetch_page(PAGE, offset).await?;
    if rows.is_empty() {
      break;
    }
    for row in &rows {
      table.add_row(row.iter().map(|v| v.clone().unwrap_or_else(|| "NULL".to_string())));
    }
    printed_header = true;
    offset += rows.len() as i64;
    if (rows.len() as i64) < PAGE {
      break;
    }
  }
  if printed_header || ctx.row_count == 0 {
    println!("{table}");
  }
  println!("{} rows", ctx.row_count);
  ctx.close().await?;
  Ok(())
}

async fn run_query_command(endpoint: String, token: String, sql: String) -> anyhow::Result<()> {
  let transport = Transport::from_url(&endpoint, token).context("constructing transport")?;
  let engine = memory_engine()?;
  let executor = RemoteExecutor::new(transport, engine);
  executor.ping().await.context("endpoint health check failed")?;
  let ctx = executor.query_context(&sql, CancellationToken::new()).await?;
  drain_and_print(ctx).await
}

async fn run_resolve_command(
  principal: String,
  directory: PathBuf,
  sql: Option<String>,
) -> anyhow::Result<()> {
  let directory = seed::load(&directory).await?;
  let local_engine = memory_engine()?;
  let staging_engine = memory_engine()?;
  let resolver = Resolver::new(local_engine.clone(), staging_engine).with_repositories(
    directory.clone(),
    directory.clone(),
    directory,
  );

  match resolver.resolve(&principal).await {
    Ok(Some(Executor::Local(_))) => println!("{} -> {}", principal, "local".green()),
    Ok(Some(Executor::Remote(_))) => println!("{} -> {}", principal, "remote".green()),
    Ok(None) => println!("{} -> {}", principal, "local (no assignment, default fallback)".yellow()),
    Err(e) => {
      println!("{} -> {} ({e:#})", principal, "error".red());
      return Err(e.into());
    }
  }

  let Some(sql) = sql else { return Ok(()) };
  let executor = resolver.resolve(&principal).await?;
  let ctx = match executor {
    Some(Executor::Local(local)) => local.query_context(&sql).await?,
    Some(Executor::Remote(remote)) => remote.query_context(&sql, CancellationToken::new()).await?,
    None => LocalExecutor::new(local_engine).query_context(&sql).await?,
  };
  drain_and_print(ctx).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  logger::init(config::control_logging())?;

  let cli = Cli::parse();
  match cli.command {
    Command::Query { endpoint, token, sql } => run_query_command(endpoint, token, sql).await,
    Command::Resolve { principal, directory, sql } => run_resolve_command(principal, directory, sql).await,
  }
}
