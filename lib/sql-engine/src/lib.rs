//! Embedded DuckDB handle shared by the agent's lifecycle engine: a
//! connection pool plus the handful of SQL operations the query lifecycle
//! needs (materialize a result set, introspect its columns, page through
//! its rows, tear it down again).

mod engine;
mod error;
mod manager;

pub use engine::{
  create_table_as, drop_table_if_exists, execute_statement, memory_usage_bytes, quote_ident,
  table_columns, table_row_count, select_page, Engine,
};
pub use error::EngineError;
pub use manager::{DuckDbConnectionManager, Pool, PooledConnection};

#[cfg(test)]
mod tests {
  use super::*;
  use r2d2::Pool as R2d2Pool;

  fn memory_engine() -> Engine {
    let manager = DuckDbConnectionManager::memory().expect("open in-memory duckdb");
    let pool = R2d2Pool::builder().max_size(4).build(manager).expect("build pool");
    Engine::new(pool)
  }

  #[test]
  fn pooled_connections_share_the_same_database() {
    let engine = memory_engine();
    let a = engine.get().expect("checkout a");
    create_table_as(&a, "t", "SELECT 1 AS x").expect("create table");
    drop(a);

    let b = engine.get().expect("checkout b");
    let count = table_row_count(&b, "t").expect("row count");
    assert_eq!(count, 1);
  }

  #[test]
  fn select_page_renders_nulls_and_scalars_as_text() {
    let engine = memory_engine();
    let conn = engine.get().expect("checkout");
    create_table_as(
      &conn,
      "t",
      "SELECT * FROM (VALUES (1, 'a', NULL), (2, 'b', 3.5)) AS v(id, label, score)",
    )
    .expect("create table");

    let columns = table_columns(&conn, "t").expect("columns");
    assert_eq!(columns, vec!["id", "label", "score"]);

    let rows = select_page(&conn, "t", &columns, 10, 0).expect("select page");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], vec![Some("1".to_string()), Some("a".to_string()), None]);
    assert_eq!(
      rows[1],
      vec![Some("2".to_string()), Some("b".to_string()), Some("3.5".to_string())]
    );
  }

  #[test]
  fn create_table_as_replaces_an_existing_table() {
    let engine = memory_engine();
    let conn = engine.get().expect("checkout");
    create_table_as(&conn, "t", "SELECT 1 AS x").expect("first create");
    create_table_as(&conn, "t", "SELECT 2 AS y").expect("second create");

    let columns = table_columns(&conn, "t").expect("columns");
    assert_eq!(columns, vec!["y"]);
  }

  #[test]
  fn drop_table_if_exists_is_idempotent() {
    let engine = memory_engine();
    let conn = engine.get().expect("checkout");
    drop_table_if_exists(&conn, "does_not_exist").expect("first drop is a no-op");
    drop_table_if_exists(&conn, "does_not_exist").expect("second drop is still a no-op");
  }

  #[test]
  fn memory_usage_bytes_reports_a_non_negative_total() {
    let engine = memory_engine();
    let conn = engine.get().expect("checkout");
    create_table_as(&conn, "t", "SELECT i FROM range(0, 10000) t(i)").expect("create table");
    let usage = memory_usage_bytes(&conn).expect("memory usage");
    assert!(usage >= 0);
  }
}
