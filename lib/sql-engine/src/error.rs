#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("acquiring pooled connection: {0}")]
  Pool(#[from] r2d2::Error),

  #[error("duckdb: {0}")]
  Duckdb(#[from] duckdb::Error),

  #[error("unknown result table {0:?}")]
  UnknownTable(String),

  #[error("query interrupted")]
  Interrupted,
}
