//! # Workflow Root
//!
//! One workflow-tree instance representing a business-level operation, with
//! its own terminal-status lifecycle and optional callback sub-trees
//! triggered by the parent's outcome.

use crate::error::{CoreError, Result};
use crate::state_machine::RootStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Root kind: only Normal roots may own callback roots; callback roots are
/// triggered by their parent's terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RootKind {
    Normal,
    OnSuccess,
    OnFailure,
    OnComplete,
}

impl RootKind {
    /// Check if a root of this kind should be triggered by a parent
    /// outcome (`true` = parent settled successfully)
    pub fn triggers_on(&self, parent_succeeded: bool) -> bool {
        match self {
            Self::Normal => false,
            Self::OnSuccess => parent_succeeded,
            Self::OnFailure => !parent_succeeded,
            Self::OnComplete => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRoot {
    pub id: Uuid,
    pub root_kind: RootKind,
    pub status: RootStatus,
    /// The task record this workflow reports into
    pub task_id: String,
    /// Set on callback roots only
    pub parent_id: Option<Uuid>,
    /// Whether the parent waits for this callback before declaring itself
    /// fully terminal
    pub hold_parent_status_update: bool,
    /// JSON snapshot of the parent root captured at trigger time
    pub parent_root_copy: Option<Value>,
    /// Set when a WorkflowTerminated failure truncated this root; a
    /// terminated root never triggers its callbacks
    pub terminated: bool,
    pub associated_task_ids: Vec<Uuid>,
    pub callback_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowRoot {
    pub fn new(root_kind: RootKind, task_id: impl Into<String>) -> Self {
        let status = match root_kind {
            RootKind::Normal => RootStatus::Pending,
            // Callback roots wait for their parent's terminal status
            _ => RootStatus::OnHold,
        };
        Self {
            id: Uuid::new_v4(),
            root_kind,
            status,
            task_id: task_id.into(),
            parent_id: None,
            hold_parent_status_update: false,
            parent_root_copy: None,
            terminated: false,
            associated_task_ids: Vec::new(),
            callback_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach a dependent sub-workflow triggered after this root reaches a
    /// terminal status. Only legal on Normal roots attaching non-Normal
    /// roots — a checked precondition, not an assert.
    pub fn add_callback_root(
        &mut self,
        callback: &mut WorkflowRoot,
        hold_parent_status_update: bool,
    ) -> Result<()> {
        if self.root_kind != RootKind::Normal {
            return Err(CoreError::CompositionError(format!(
                "callbacks can only be attached to NORMAL roots, not {:?}",
                self.root_kind
            )));
        }
        if callback.root_kind == RootKind::Normal {
            return Err(CoreError::CompositionError(
                "a NORMAL root cannot be attached as a callback".to_string(),
            ));
        }

        callback.parent_id = Some(self.id);
        callback.hold_parent_status_update = hold_parent_status_update;
        if !self.callback_ids.contains(&callback.id) {
            self.callback_ids.push(callback.id);
        }
        Ok(())
    }

    /// JSON representation captured as `parent_root_copy` for callbacks and
    /// operator inspection
    pub fn to_snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
