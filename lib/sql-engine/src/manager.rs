use duckdb::Connection;

/// r2d2 connection manager for an embedded DuckDB database.
///
/// DuckDB's `:memory:` target creates an independent, empty database on
/// every `Connection::open` call, so pooled connections are produced via
/// `try_clone` off a single template connection that owns the underlying
/// (possibly in-memory) database — this is what lets every connection
/// checked out of the pool see the same tables.
pub struct DuckDbConnectionManager {
  template: Connection,
}

impl DuckDbConnectionManager {
  pub fn memory() -> Result<Self, duckdb::Error> {
    Ok(DuckDbConnectionManager {
      template: Connection::open_in_memory()?,
    })
  }

  pub fn file(path: impl AsRef<std::path::Path>) -> Result<Self, duckdb::Error> {
    Ok(DuckDbConnectionManager { template: Connection::open(path)? })
  }
}

impl r2d2::ManageConnection for DuckDbConnectionManager {
  type Connection = Connection;
  type Error = duckdb::Error;

  fn connect(&self) -> Result<Connection, Self::Error> {
    self.template.try_clone()
  }

  fn is_valid(&self, conn: &mut Connection) -> Result<(), Self::Error> {
    conn.execute_batch("SELECT 1")
  }

  fn has_broken(&self, _conn: &mut Connection) -> bool {
    false
  }
}

pub type Pool = r2d2::Pool<DuckDbConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<DuckDbConnectionManager>;
