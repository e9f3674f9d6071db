use serde::{Deserialize, Serialize};

use crate::proto;

/// Lifecycle status of a [`crate::QueryJob`](crate::types). Transitions are
/// monotone: QUEUED -> RUNNING -> one of {SUCCEEDED, FAILED, CANCELED}.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
  Queued,
  Running,
  Succeeded,
  Failed,
  Canceled,
}

impl Status {
  pub fn is_terminal(self) -> bool {
    matches!(self, Status::Succeeded | Status::Failed | Status::Canceled)
  }
}

impl std::fmt::Display for Status {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Status::Queued => "QUEUED",
      Status::Running => "RUNNING",
      Status::Succeeded => "SUCCEEDED",
      Status::Failed => "FAILED",
      Status::Canceled => "CANCELED",
    };
    f.write_str(s)
  }
}

impl From<Status> for proto::QueryStatus {
  fn from(value: Status) -> Self {
    match value {
      Status::Queued => proto::QueryStatus::Queued,
      Status::Running => proto::QueryStatus::Running,
      Status::Succeeded => proto::QueryStatus::Succeeded,
      Status::Failed => proto::QueryStatus::Failed,
      Status::Canceled => proto::QueryStatus::Canceled,
    }
  }
}

impl From<proto::QueryStatus> for Status {
  fn from(value: proto::QueryStatus) -> Self {
    match value {
      proto::QueryStatus::Queued => Status::Queued,
      proto::QueryStatus::Running => Status::Running,
      proto::QueryStatus::Succeeded => Status::Succeeded,
      proto::QueryStatus::Failed => Status::Failed,
      proto::QueryStatus::Canceled => Status::Canceled,
    }
  }
}
