//! # Task Finalizer
//!
//! The drain loop that closes out a task: repeatedly query the task's
//! SubTasks, delete each one that has resolved, and loop until none remain.
//! This is polling reconciliation, re-invoked as the final step of every
//! chain rather than running as a background daemon. The task's final
//! status is FAILED iff at least one SubTask resolved FAILED.

use crate::config::OrchestratorConfig;
use crate::logging::log_task_operation;
use crate::orchestration::types::ProvisionError;
use crate::state_machine::{SubTaskStatus, TaskStatus};
use crate::store::{SubTaskStore, TaskStore};
use std::sync::Arc;

pub struct TaskFinalizer {
    tasks: Arc<TaskStore>,
    sub_tasks: Arc<SubTaskStore>,
    config: Arc<OrchestratorConfig>,
}

impl TaskFinalizer {
    pub fn new(
        tasks: Arc<TaskStore>,
        sub_tasks: Arc<SubTaskStore>,
        config: Arc<OrchestratorConfig>,
    ) -> Self {
        Self {
            tasks,
            sub_tasks,
            config,
        }
    }

    /// Drain the task's SubTasks and settle its terminal status. Passes are
    /// bounded; a task whose SubTasks never resolve is forced FAILED.
    pub async fn finalize(&self, task_id: &str) -> Result<TaskStatus, ProvisionError> {
        let mut any_failed = false;

        for pass in 0..self.config.finalizer_max_passes {
            let remaining = self.drain_resolved(task_id, &mut any_failed);
            if remaining == 0 {
                return Ok(self.settle(task_id, any_failed));
            }

            tracing::debug!(
                task_id,
                pass,
                remaining,
                "Finalizer waiting on unresolved sub-tasks"
            );
            tokio::time::sleep(self.config.finalizer_poll_interval()).await;
        }

        self.tasks.set_status(task_id, TaskStatus::Failed);
        Err(ProvisionError::TaskFailure(format!(
            "sub-tasks of {task_id} did not drain within {} passes",
            self.config.finalizer_max_passes
        )))
    }

    /// Delete resolved SubTasks, returning how many are still running
    fn drain_resolved(&self, task_id: &str, any_failed: &mut bool) -> usize {
        let mut remaining = 0;
        for sub_task in self.sub_tasks.for_task(task_id) {
            if sub_task.status.is_resolved() {
                if sub_task.status == SubTaskStatus::Failed {
                    *any_failed = true;
                }
                self.sub_tasks.remove(sub_task.id);
            } else {
                remaining += 1;
            }
        }
        remaining
    }

    fn settle(&self, task_id: &str, any_failed: bool) -> TaskStatus {
        let status = if any_failed {
            TaskStatus::Failed
        } else {
            TaskStatus::Success
        };
        // First terminal write wins: a WorkflowTerminated failure that
        // already forced the task FAILED is not overwritten here
        self.tasks.set_status(task_id, status);
        let settled = self
            .tasks
            .get(task_id)
            .map(|task| task.status)
            .unwrap_or(status);

        log_task_operation(
            "task_finalized",
            Some(task_id),
            None,
            &settled.to_string(),
            None,
        );
        settled
    }
}
