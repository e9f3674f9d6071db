use std::sync::OnceLock;

use clap::Parser;
use logger::LogConfig;
use serde::Deserialize;

/// `AGENT_`-prefixed environment variables, parsed by `envy`. Mirrors the
/// teacher's `envy`/`dotenvy` config convention minus its bespoke TOML
/// `ConfigLoader` (this service has no layered file config to merge).
#[derive(Debug, Deserialize)]
pub struct Env {
  /// Shared secret every caller must present via `X-Agent-Token` /
  /// `x-agent-token`.
  pub agent_token: String,
  #[serde(default = "default_http_bind")]
  pub agent_http_bind: String,
  #[serde(default = "default_grpc_bind")]
  pub agent_grpc_bind: String,
  /// DuckDB `memory_limit` pragma value, e.g. `"2GB"`. Unset means no cap.
  pub agent_memory_limit: Option<String>,
  #[serde(default = "default_page_size")]
  pub agent_default_page_size: i32,
  #[serde(default = "default_result_ttl_secs")]
  pub agent_result_ttl_secs: i64,
  #[serde(default = "default_cleanup_interval_secs")]
  pub agent_cleanup_interval_secs: u64,
  /// When set, every HTTP request must carry a valid HMAC signature
  /// (`X-Agent-Timestamp` + `X-Agent-Signature`) within this skew, in
  /// seconds.
  pub agent_signature_max_skew_secs: Option<i64>,
  pub agent_ssl_cert_file: Option<String>,
  pub agent_ssl_key_file: Option<String>,
  #[serde(default)]
  pub agent_log_level: String,
  #[serde(default)]
  pub agent_log_format: logger::LogFormat,
}

fn default_http_bind() -> String {
  "0.0.0.0:8980".to_string()
}

fn default_grpc_bind() -> String {
  "0.0.0.0:8981".to_string()
}

fn default_page_size() -> i32 {
  wire::types::DEFAULT_PAGE_SIZE
}

fn default_result_ttl_secs() -> i64 {
  60 * 60
}

fn default_cleanup_interval_secs() -> u64 {
  30
}

#[derive(Parser, Debug)]
#[command(name = "agent", about = "Embedded-engine compute agent")]
pub struct CliArgs {
  #[arg(long)]
  pub log_level: Option<String>,
}

pub fn agent_args() -> &'static CliArgs {
  static ARGS: OnceLock<CliArgs> = OnceLock::new();
  ARGS.get_or_init(CliArgs::parse)
}

#[derive(Debug)]
pub struct AgentConfig {
  pub token: String,
  pub http_bind: String,
  pub grpc_bind: String,
  pub memory_limit: Option<String>,
  pub default_page_size: i32,
  pub result_ttl_secs: i64,
  pub cleanup_interval_secs: u64,
  pub signature_max_skew_secs: Option<i64>,
  pub ssl_cert_file: Option<String>,
  pub ssl_key_file: Option<String>,
  pub logging: LogConfig,
}

pub fn agent_config() -> &'static AgentConfig {
  static CONFIG: OnceLock<AgentConfig> = OnceLock::new();
  CONFIG.get_or_init(|| {
    let env: Env =
      envy::from_env().expect("failed to parse AGENT_* environment");
    let args = agent_args();
    AgentConfig {
      token: env.agent_token,
      http_bind: env.agent_http_bind,
      grpc_bind: env.agent_grpc_bind,
      memory_limit: env.agent_memory_limit,
      default_page_size: env.agent_default_page_size,
      result_ttl_secs: env.agent_result_ttl_secs,
      cleanup_interval_secs: env.agent_cleanup_interval_secs,
      signature_max_skew_secs: env.agent_signature_max_skew_secs,
      ssl_cert_file: env.agent_ssl_cert_file,
      ssl_key_file: env.agent_ssl_key_file,
      logging: LogConfig {
        level: args
          .log_level
          .clone()
          .unwrap_or_else(|| if env.agent_log_level.is_empty() {
            "info".to_string()
          } else {
            env.agent_log_level
          }),
        format: env.agent_log_format,
        ansi: true,
      },
    }
  })
}
