//! # Task Record and SubTask
//!
//! `TaskRecord` is the durable record of one user- or system-initiated
//! operation: status, structured report, resource linkage, timestamps, and
//! the original request payload for auditability. `SubTask` is the
//! ephemeral per-execution-unit record the finalizer drains; a task is
//! complete only once its SubTask set is empty.

use crate::models::report::Report;
use crate::models::resources::ResourceKind;
use crate::state_machine::{SubTaskStatus, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The action a task performs on its resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    Add,
    Update,
    Delete,
    Sync,
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Sync => "SYNC",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub kind: ResourceKind,
    pub action: TaskAction,
    pub cloud_id: String,
    pub region: Option<String>,
    /// Natural name of the primary resource this task acts on
    pub resource_name: Option<String>,
    pub status: TaskStatus,
    /// User-visible failure/summary message (masking applied per error kind)
    pub message: String,
    pub report: Report,
    /// Original request body, retained for auditability and replay
    pub request_payload: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(
        id: impl Into<String>,
        kind: ResourceKind,
        action: TaskAction,
        cloud_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            action,
            cloud_id: cloud_id.into(),
            region: None,
            resource_name: None,
            status: TaskStatus::Created,
            message: String::new(),
            report: Report::default(),
            request_payload: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.request_payload = Some(payload);
        self
    }

    /// Apply a status value. Terminal statuses stamp `completed_at`; the
    /// first terminal write wins and later conflicting writes are ignored.
    ///
    /// Returns true if the status was applied.
    pub fn apply_status(&mut self, status: TaskStatus) -> bool {
        if self.status.is_terminal() {
            if self.status != status {
                tracing::warn!(
                    task_id = %self.id,
                    current = %self.status,
                    rejected = %status,
                    "Ignoring conflicting terminal status write"
                );
            }
            return false;
        }

        self.status = status;
        if status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }
}

/// Ephemeral record of one asynchronous unit of execution belonging to a
/// task; deleted by the finalizer once observed as resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: Uuid,
    pub task_id: String,
    pub status: SubTaskStatus,
    pub created_at: DateTime<Utc>,
}

impl SubTask {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            status: SubTaskStatus::Running,
            created_at: Utc::now(),
        }
    }
}
