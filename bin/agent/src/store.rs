use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use wire::Status;

/// Server-side state for one submitted SQL statement. Mutable fields live
/// behind the job's own lock; `id`/`request_id`/`created_at`/`cancel` never
/// change after construction and are safe to read without it.
pub struct QueryJob {
  pub id: String,
  pub request_id: String,
  pub created_at: DateTime<Utc>,
  pub cancel: CancellationToken,
  state: Mutex<JobState>,
}

#[derive(Clone)]
struct JobState {
  status: Status,
  columns: Option<Vec<String>>,
  result_table: String,
  row_count: Option<i64>,
  error: Option<String>,
  completed_at: Option<DateTime<Utc>>,
}

/// Immutable snapshot of a job's mutable fields, taken under its lock.
#[derive(Clone)]
pub struct JobSnapshot {
  pub id: String,
  pub request_id: String,
  pub status: Status,
  pub columns: Option<Vec<String>>,
  pub result_table: String,
  pub row_count: Option<i64>,
  pub error: Option<String>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl QueryJob {
  fn new(id: String, request_id: String) -> Self {
    QueryJob {
      id,
      request_id,
      created_at: Utc::now(),
      cancel: CancellationToken::new(),
      state: Mutex::new(JobState {
        status: Status::Queued,
        columns: None,
        result_table: String::new(),
        row_count: None,
        error: None,
        completed_at: None,
      }),
    }
  }

  pub async fn snapshot(&self) -> JobSnapshot {
    let state = self.state.lock().await;
    JobSnapshot {
      id: self.id.clone(),
      request_id: self.request_id.clone(),
      status: state.status,
      columns: state.columns.clone(),
      result_table: state.result_table.clone(),
      row_count: state.row_count,
      error: state.error.clone(),
      completed_at: state.completed_at,
    }
  }

  pub async fn status(&self) -> Status {
    self.state.lock().await.status
  }

  pub async fn mark_running(&self) {
    let mut state = self.state.lock().await;
    if state.status == Status::Queued {
      state.status = Status::Running;
    }
  }

  pub async fn mark_succeeded(
    &self,
    result_table: String,
    columns: Vec<String>,
    row_count: i64,
  ) {
    let mut state = self.state.lock().await;
    state.status = Status::Succeeded;
    state.result_table = result_table;
    state.columns = Some(columns);
    state.row_count = Some(row_count);
    state.completed_at = Some(Utc::now());
  }

  pub async fn mark_failed(&self, error: String) {
    let mut state = self.state.lock().await;
    state.status = Status::Failed;
    state.error = Some(error);
    state.completed_at = Some(Utc::now());
  }

  pub async fn mark_canceled(&self, reason: String) {
    let mut state = self.state.lock().await;
    state.status = Status::Canceled;
    state.error = Some(reason);
    state.completed_at = Some(Utc::now());
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StoreMetrics {
  pub queued: i64,
  pub running: i64,
  pub completed: i64,
  pub stored: i64,
  pub cleaned: u64,
}

struct Inner {
  jobs: HashMap<String, Arc<QueryJob>>,
  /// request_id -> query_id, for non-terminal jobs only (see `set`/`delete`
  /// and the TTL sweep, which release the mapping once a job both reaches
  /// a terminal state and its TTL elapses).
  by_request_id: HashMap<String, String>,
  cleaned: u64,
  last_cleanup: Option<std::time::Instant>,
}

/// In-memory registry of live [`QueryJob`]s: O(1) lookup by query-id and by
/// client request-id, idempotent submission, and a lazy TTL sweeper. A
/// single mutex serializes index mutations; it is never held across engine
/// I/O (`maybe_cleanup` drops it before issuing the worker-side `DROP`).
pub struct Store {
  inner: Mutex<Inner>,
  next_id: AtomicU64,
  ttl: Duration,
  /// Floor on how often `maybe_cleanup` actually sweeps, so a burst of
  /// calls (one per request) doesn't turn into a sweep storm.
  min_sweep_interval: Duration,
}

/// Prefix for generated query-ids and result-table names: both are
/// server-controlled, so a plain hex counter keeps them valid SQL
/// identifiers without needing to quote-escape anything unexpected.
const ID_PREFIX: &str = "q";

impl Store {
  pub fn new(ttl: Duration, min_sweep_interval: Duration) -> Self {
    Store {
      inner: Mutex::new(Inner {
        jobs: HashMap::new(),
        by_request_id: HashMap::new(),
        cleaned: 0,
        last_cleanup: None,
      }),
      next_id: AtomicU64::new(1),
      ttl,
      min_sweep_interval,
    }
  }

  fn allocate_id(&self) -> String {
    let n = self.next_id.fetch_add(1, Ordering::Relaxed);
    format!("{ID_PREFIX}{n:020x}")
  }

  /// Allocates a fresh job, QUEUED, and registers it under both indices.
  pub async fn create(&self, request_id: String) -> Arc<QueryJob> {
    let job = Arc::new(QueryJob::new(self.allocate_id(), request_id.clone()));
    let mut inner = self.inner.lock().await;
    inner.jobs.insert(job.id.clone(), job.clone());
    inner.by_request_id.insert(request_id, job.id.clone());
    job
  }

  pub async fn get(&self, query_id: &str) -> Option<Arc<QueryJob>> {
    self.inner.lock().await.jobs.get(query_id).cloned()
  }

  /// Returns the non-terminal job registered under `request_id`, if any.
  /// The index itself isn't pruned the instant a job goes terminal (the
  /// TTL sweep does that lazily), so a terminal hit here is filtered out
  /// rather than returned — idempotent replay only ever sees a job that
  /// hasn't finished yet.
  pub async fn get_by_request_id(&self, request_id: &str) -> Option<Arc<QueryJob>> {
    let job = {
      let inner = self.inner.lock().await;
      let query_id = inner.by_request_id.get(request_id)?;
      inner.jobs.get(query_id).cloned()?
    };
    let is_terminal = job.status().await.is_terminal();
    (!is_terminal).then_some(job)
  }

  pub async fn delete(&self, query_id: &str) -> Option<Arc<QueryJob>> {
    let mut inner = self.inner.lock().await;
    let job = inner.jobs.remove(query_id)?;
    if inner.by_request_id.get(&job.request_id) == Some(&job.id) {
      inner.by_request_id.remove(&job.request_id);
    }
    Some(job)
  }

  /// Sweeps terminal jobs whose `completed_at` is older than the TTL,
  /// dropping their result table on `engine` and removing them from both
  /// indices. Rate-limited by `min_sweep_interval` and always best-effort:
  /// engine errors are counted, never surfaced.
  pub async fn maybe_cleanup(&self, engine: &sql_engine::Engine) {
    let now = std::time::Instant::now();
    let expired = {
      let mut inner = self.inner.lock().await;
      if let Some(last) = inner.last_cleanup {
        if now.duration_since(last) < self.min_sweep_interval {
          return;
        }
      }
      inner.last_cleanup = Some(now);

      let wall_now = Utc::now();
      let mut expired = Vec::new();
      for job in inner.jobs.values() {
        let snapshot = job.try_snapshot_for_sweep();
        if let Some((status, completed_at)) = snapshot {
          if status.is_terminal() {
            if let Some(completed_at) = completed_at {
              if wall_now - completed_at > chrono::Duration::from_std(self.ttl).unwrap_or_default() {
                expired.push(job.clone());
              }
            }
          }
        }
      }
      for job in &expired {
        inner.jobs.remove(&job.id);
        if inner.by_request_id.get(&job.request_id) == Some(&job.id) {
          inner.by_request_id.remove(&job.request_id);
        }
      }
      inner.cleaned += expired.len() as u64;
      expired
    };

    for job in expired {
      let snapshot = job.snapshot().await;
      if snapshot.result_table.is_empty() {
        continue;
      }
      let engine = engine.clone();
      let table = snapshot.result_table;
      let job_id = job.id.clone();
      let result = tokio::task::spawn_blocking(move || {
        let conn = engine.get()?;
        sql_engine::drop_table_if_exists(&conn, &table)
      })
      .await;
      match result {
        Err(e) => tracing::warn!(query_id = %job_id, "TTL sweep drop-table task panicked: {e}"),
        Ok(Err(e)) => tracing::warn!(query_id = %job_id, "TTL sweep failed to drop result table: {e}"),
        Ok(Ok(())) => {}
      }
    }
  }

  pub async fn metrics(&self) -> StoreMetrics {
    let inner = self.inner.lock().await;
    let mut metrics = StoreMetrics { stored: inner.jobs.len() as i64, cleaned: inner.cleaned, ..Default::default() };
    for job in inner.jobs.values() {
      match job.status().await {
        Status::Queued => metrics.queued += 1,
        Status::Running => metrics.running += 1,
        s if s.is_terminal() => metrics.completed += 1,
        _ => {}
      }
    }
    metrics
  }
}

impl QueryJob {
  /// Non-blocking-ish snapshot used only by the sweep's first pass to
  /// decide which jobs are even candidates; takes the job lock but does no
  /// I/O, so it's cheap to call while the store lock is held.
  fn try_snapshot_for_sweep(&self) -> Option<(Status, Option<DateTime<Utc>>)> {
    self.state.try_lock().ok().map(|s| (s.status, s.completed_at))
  }
}
