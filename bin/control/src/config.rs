use std::sync::OnceLock;

use logger::{LogConfig, LogFormat};
use serde::Deserialize;

/// `CONTROL_`-prefixed environment variables for the CLI's own ambient
/// concerns (logging); everything else (endpoint, token, principal) is
/// supplied per-invocation via CLI args, since this binary is a one-shot
/// tool rather than a long-running service.
#[derive(Debug, Deserialize, Default)]
pub struct Env {
  #[serde(default)]
  pub control_log_level: String,
  #[serde(default)]
  pub control_log_format: LogFormat,
}

pub fn control_logging() -> &'static LogConfig {
  static CONFIG: OnceLock<LogConfig> = OnceLock::new();
  CONFIG.get_or_init(|| {
    let env: Env = envy::from_env().unwrap_or_default();
    LogConfig {
      level: if env.control_log_level.is_empty() { "warn".to_string() } else { env.control_log_level },
      format: env.control_log_format,
      ansi: true,
    }
  })
}
