use anyhow::Context;
use tracing_subscriber::{
  EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
  #[default]
  Pretty,
  Json,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogConfig {
  /// `error` | `warn` | `info` | `debug` | `trace`, defaults to `info`.
  pub level: String,
  pub format: LogFormat,
  pub ansi: bool,
}

impl Default for LogConfig {
  fn default() -> Self {
    LogConfig {
      level: "info".to_string(),
      format: LogFormat::default(),
      ansi: true,
    }
  }
}

/// Initializes the global tracing subscriber. Call once at process startup.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
  let filter = EnvFilter::try_new(&config.level)
    .unwrap_or_else(|_| EnvFilter::new("info"));

  let registry = Registry::default().with(filter);

  match config.format {
    LogFormat::Json => registry
      .with(tracing_subscriber::fmt::layer().json())
      .try_init(),
    LogFormat::Pretty => registry
      .with(
        tracing_subscriber::fmt::layer()
          .with_target(false)
          .with_ansi(config.ansi),
      )
      .try_init(),
  }
  .context("failed to init logger")
}
