use duckdb::Connection;
use wire::types::Row;

use crate::error::EngineError;
use crate::manager::Pool;

/// Double-quotes an identifier for interpolation into DDL, doubling any
/// embedded quote so `result set "weird"""` round-trips.
pub fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quotes a SQL string literal, doubling any embedded quote.
fn quote_literal(value: &str) -> String {
  format!("'{}'", value.replace('\'', "''"))
}

/// Thin handle around a pooled set of connections to one embedded DuckDB
/// database. Cheap to clone; the pool itself is reference counted.
#[derive(Clone)]
pub struct Engine {
  pool: Pool,
}

impl Engine {
  pub fn new(pool: Pool) -> Self {
    Engine { pool }
  }

  pub fn pool(&self) -> &Pool {
    &self.pool
  }

  pub fn get(&self) -> Result<crate::manager::PooledConnection, EngineError> {
    Ok(self.pool.get()?)
  }
}

/// Materializes `select_sql` into a new table named `table`, replacing any
/// existing table of that name. Runs on whatever connection the caller
/// passes in — callers that need cancellation race this against an
/// `InterruptHandle` taken from the same connection before entering the
/// blocking call.
pub fn create_table_as(conn: &Connection, table: &str, select_sql: &str) -> Result<(), EngineError> {
  drop_table_if_exists(conn, table)?;
  let ddl = format!("CREATE TABLE {} AS {}", quote_ident(table), select_sql);
  conn.execute_batch(&ddl)?;
  Ok(())
}

/// Runs arbitrary DDL/DML to completion without producing a result table,
/// used for statements that aren't a `SELECT`-shaped query (e.g. `CREATE
/// TABLE`, `INSERT`, `COPY`). Callers that need row/column feedback should
/// prefer [`create_table_as`] instead.
pub fn execute_statement(conn: &Connection, sql: &str) -> Result<(), EngineError> {
  conn.execute_batch(sql)?;
  Ok(())
}

pub fn drop_table_if_exists(conn: &Connection, table: &str) -> Result<(), EngineError> {
  let ddl = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
  conn.execute_batch(&ddl)?;
  Ok(())
}

/// Column names of `table`, in declaration order, via DuckDB's
/// `pragma_table_info` table function.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, EngineError> {
  let sql = format!(
    "SELECT name FROM pragma_table_info({}) ORDER BY cid",
    quote_literal(table)
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt.query_map([], |row| row.get::<usize, String>(0))?;
  let mut columns = Vec::new();
  for row in rows {
    columns.push(row?);
  }
  Ok(columns)
}

pub fn table_row_count(conn: &Connection, table: &str) -> Result<i64, EngineError> {
  let sql = format!("SELECT count(*) FROM {}", quote_ident(table));
  let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
  Ok(count)
}

/// Total bytes the embedded engine currently has allocated, summed across
/// `duckdb_memory()`'s per-tag breakdown (buffer manager, hash tables,
/// etc.) — used to populate `Health`'s `memory_bytes` counter.
pub fn memory_usage_bytes(conn: &Connection) -> Result<i64, EngineError> {
  let count: i64 =
    conn.query_row("SELECT CAST(sum(memory_usage_bytes) AS BIGINT) FROM duckdb_memory()", [], |row| {
      row.get::<usize, Option<i64>>(0)
    })?
    .unwrap_or(0);
  Ok(count)
}

/// Reads `limit` rows starting at `offset` from `table`, casting every
/// column to `VARCHAR` so the driver hands back DuckDB's own lossless
/// textual rendering (nulls stay null; numbers, booleans, dates and the
/// rest render exactly as DuckDB's `::VARCHAR` cast would).
pub fn select_page(
  conn: &Connection,
  table: &str,
  columns: &[String],
  limit: i64,
  offset: i64,
) -> Result<Vec<Row>, EngineError> {
  if columns.is_empty() {
    return Ok(Vec::new());
  }
  let projection = columns
    .iter()
    .map(|c| format!("CAST({} AS VARCHAR)", quote_ident(c)))
    .collect::<Vec<_>>()
    .join(", ");
  let sql = format!(
    "SELECT {} FROM {} LIMIT {} OFFSET {}",
    projection,
    quote_ident(table),
    limit,
    offset
  );
  let mut stmt = conn.prepare(&sql)?;
  let column_count = columns.len();
  let rows = stmt.query_map([], move |row| {
    let mut values = Vec::with_capacity(column_count);
    for idx in 0..column_count {
      values.push(row.get::<usize, Option<String>>(idx)?);
    }
    Ok(values)
  })?;
  let mut out = Vec::new();
  for row in rows {
    out.push(row?);
  }
  Ok(out)
}
