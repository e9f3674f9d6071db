use std::time::Duration;

use sql_engine::Engine;
use tokio_util::sync::CancellationToken;
use wire::types::Row;
use wire::Status;

use crate::error::ClientError;
use crate::transport::Transport;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const DETACHED_TIMEOUT: Duration = Duration::from_secs(5);

/// The materialized result of one `QueryContext` call: a staging relation
/// on the local embedded engine that the caller pages through like any
/// other local table, plus the column list and total row count the
/// lifecycle (or legacy) path already determined.
pub struct QueryContext {
  engine: Engine,
  table: String,
  pub columns: Vec<String>,
  pub row_count: i64,
}

impl QueryContext {
  pub async fn fetch_page(&self, limit: i64, offset: i64) -> Result<Vec<Row>, ClientError> {
    if self.table.is_empty() {
      return Ok(Vec::new());
    }
    let engine = self.engine.clone();
    let table = self.table.clone();
    let columns = self.columns.clone();
    let rows = tokio::task::spawn_blocking(move || {
      let conn = engine.get()?;
      sql_engine::select_page(&conn, &table, &columns, limit, offset)
    })
    .await
    .map_err(|_| ClientError::QueryFailed {
      query_id: table.clone(),
      reason: "materialization task panicked".to_string(),
    })??;
    Ok(rows)
  }

  /// Drops the staging relation. Best-effort: callers that forget to call
  /// this leak the relation, per the documented materialization contract.
  pub async fn close(self) -> Result<(), ClientError> {
    if self.table.is_empty() {
      return Ok(());
    }
    let engine = self.engine.clone();
    let table = self.table.clone();
    tokio::task::spawn_blocking(move || {
      let conn = engine.get()?;
      sql_engine::drop_table_if_exists(&conn, &table)
    })
    .await
    .map_err(|_| ClientError::QueryFailed {
      query_id: table.clone(),
      reason: "close task panicked".to_string(),
    })??;
    Ok(())
  }
}

fn staging_table_name() -> String {
  let mut bytes = [0u8; 8];
  rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
  format!("_remote_result_{}", hex::encode(bytes))
}

/// Runs queries directly against the local embedded engine; used when the
/// resolver determines the caller's assigned endpoint is the local agent.
pub struct LocalExecutor {
  engine: Engine,
}

impl LocalExecutor {
  pub fn new(engine: Engine) -> Self {
    LocalExecutor { engine }
  }

  pub async fn query_context(&self, sql: &str) -> Result<QueryContext, ClientError> {
    let engine = self.engine.clone();
    let table = staging_table_name();
    let sql = sql.to_string();
    let (columns, row_count) = {
      let table = table.clone();
      tokio::task::spawn_blocking(move || {
        let conn = engine.get()?;
        sql_engine::create_table_as(&conn, &table, &sql)?;
        let columns = sql_engine::table_columns(&conn, &table)?;
        let row_count = sql_engine::table_row_count(&conn, &table)?;
        Ok::<_, ClientError>((columns, row_count))
      })
      .await
      .map_err(|_| ClientError::QueryFailed {
        query_id: table.clone(),
        reason: "local execution task panicked".to_string(),
      })??
    };
    Ok(QueryContext { engine: self.engine.clone(), table, columns, row_count })
  }
}

/// Drives a worker agent end-to-end over the lifecycle protocol (with a
/// one-shot legacy fallback), materializing the remote result set into a
/// local staging relation so the caller gets an ordinary row cursor.
pub struct RemoteExecutor {
  transport: Transport,
  engine: Engine,
}

impl RemoteExecutor {
  pub fn new(transport: Transport, engine: Engine) -> Self {
    RemoteExecutor { transport, engine }
  }

  pub async fn ping(&self) -> Result<(), ClientError> {
    self.transport.ping().await
  }

  pub async fn query_context(
    &self,
    sql: &str,
    cancel: CancellationToken,
  ) -> Result<QueryContext, ClientError> {
    let request_id = uuid_v4_like();
    match self.run_lifecycle(sql, &request_id, &cancel).await {
      Ok(ctx) => Ok(ctx),
      Err(err) if err.is_lifecycle_unsupported() => self.run_legacy(sql, &request_id).await,
      Err(err) => Err(err),
    }
  }

  async fn run_lifecycle(
    &self,
    sql: &str,
    request_id: &str,
    cancel: &CancellationToken,
  ) -> Result<QueryContext, ClientError> {
    let submitted = self.transport.submit_query(sql, request_id).await?;
    let query_id = submitted.query_id;

    let terminal = loop {
      if cancel.is_cancelled() {
        let _ = tokio::time::timeout(DETACHED_TIMEOUT, self.transport.cancel_query(&query_id)).await;
        let _ = tokio::time::timeout(DETACHED_TIMEOUT, self.transport.delete_query(&query_id)).await;
        return Err(ClientError::QueryCanceled {
          query_id,
          reason: "caller context canceled".to_string(),
        });
      }
      let status = self.transport.get_query_status(&query_id).await?;
      if status.status.is_terminal() {
        break status;
      }
      tokio::time::sleep(POLL_INTERVAL).await;
    };

    let result = match terminal.status {
      Status::Succeeded => self.materialize_pages(&query_id, &terminal).await,
      Status::Failed => Err(ClientError::QueryFailed {
        query_id: query_id.clone(),
        reason: terminal.error.unwrap_or_else(|| "query failed".to_string()),
      }),
      Status::Canceled => Err(ClientError::QueryCanceled {
        query_id: query_id.clone(),
        reason: terminal.error.unwrap_or_else(|| "query canceled".to_string()),
      }),
      Status::Queued | Status::Running => unreachable!("loop only exits on a terminal status"),
    };

    let _ = tokio::time::timeout(DETACHED_TIMEOUT, self.transport.delete_query(&query_id)).await;
    result
  }

  async fn materialize_pages(
    &self,
    query_id: &str,
    terminal: &wire::types::GetQueryStatusResponse,
  ) -> Result<QueryContext, ClientError> {
    let columns = terminal.columns.clone().unwrap_or_default();
    let row_count = terminal.row_count.unwrap_or(0);
    if columns.is_empty() {
      return Ok(QueryContext { engine: self.engine.clone(), table: String::new(), columns, row_count });
    }
    let table = staging_table_name();
    self.create_staging_table(&table, &columns).await?;

    let mut page_token = String::new();
    loop {
      let page = self
        .transport
        .fetch_query_results(query_id, &page_token, wire::types::DEFAULT_PAGE_SIZE)
        .await?;
      if !page.rows.is_empty() {
        self.insert_rows(&table, &page.rows).await?;
      }
      if page.next_page_token.is_empty() {
        break;
      }
      page_token = page.next_page_token;
    }

    Ok(QueryContext { engine: self.engine.clone(), table, columns, row_count })
  }

  async fn run_legacy(&self, sql: &str, request_id: &str) -> Result<QueryContext, ClientError> {
    let resp = self.transport.execute(sql, request_id).await?;
    if resp.columns.is_empty() {
      return Ok(QueryContext {
        engine: self.engine.clone(),
        table: String::new(),
        columns: resp.columns,
        row_count: resp.row_count,
      });
    }
    let table = staging_table_name();
    self.create_staging_table(&table, &resp.columns).await?;
    if !resp.rows.is_empty() {
      self.insert_rows(&table, &resp.rows).await?;
    }
    Ok(QueryContext {
      engine: self.engine.clone(),
      table,
      columns: resp.columns,
      row_count: resp.row_count,
    })
  }

  async fn create_staging_table(&self, table: &str, columns: &[String]) -> Result<(), ClientError> {
    let engine = self.engine.clone();
    let table = table.to_string();
    let columns = columns.to_vec();
    tokio::task::spawn_blocking(move || {
      let conn = engine.get()?;
      let column_defs = columns
        .iter()
        .map(|c| format!("{} VARCHAR", sql_engine::quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
      let ddl = if column_defs.is_empty() {
        format!("CREATE TABLE {} ()", sql_engine::quote_ident(&table))
      } else {
        format!("CREATE TABLE {} ({column_defs})", sql_engine::quote_ident(&table))
      };
      sql_engine::execute_statement(&conn, &ddl)
    })
    .await
    .map_err(|_| ClientError::QueryFailed {
      query_id: table.to_string(),
      reason: "staging table creation panicked".to_string(),
    })??;
    Ok(())
  }

  async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<(), ClientError> {
    let engine = self.engine.clone();
    let table = table.to_string();
    let rows = rows.to_vec();
    tokio::task::spawn_blocking(move || -> Result<(), sql_engine::EngineError> {
      let conn = engine.get()?;
      for row in &rows {
        let placeholders = vec!["?"; row.len()].join(", ");
        let sql = format!(
          "INSERT INTO {} VALUES ({placeholders})",
          sql_engine::quote_ident(&table)
        );
        let params = duckdb::params_from_iter(row.iter().map(|v| v.clone()));
        conn.execute(&sql, params)?;
      }
      Ok(())
    })
    .await
    .map_err(|_| ClientError::QueryFailed {
      query_id: table.clone(),
      reason: "row insertion panicked".to_string(),
    })??;
    Ok(())
  }
}

fn uuid_v4_like() -> String {
  uuid::Uuid::new_v4().to_string()
}
