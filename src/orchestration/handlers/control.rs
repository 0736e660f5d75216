//! Control steps: the chord finisher that converges a fan-out, and the
//! task finalization step appended to every chain.

use crate::orchestration::task_finalizer::TaskFinalizer;
use crate::orchestration::types::{ProvisionError, StepContext, StepHandler, StepOutput};
use crate::models::{ResourceKey, TaskAction};
use crate::state_machine::{NodeState, ResourceStatus, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;

/// Observes the terminal status of every chord member. Any member failure
/// terminates the whole workflow, which keeps the parent step (e.g. the
/// parent-resource deletion behind a child fan-out) from running.
pub struct ChordFinisherHandler;

#[async_trait]
impl StepHandler for ChordFinisherHandler {
    fn name(&self) -> &'static str {
        "chord_finisher"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        let failed: Vec<String> = ctx
            .node
            .previous_ids
            .iter()
            .filter_map(|id| ctx.workflows.node(*id))
            .filter(|member| member.status == NodeState::Failed)
            .map(|member| member.resource_name)
            .collect();

        if failed.is_empty() {
            return Ok(StepOutput::Done);
        }
        Err(ProvisionError::WorkflowTerminated(format!(
            "{}, {} of {} member step(s) failed",
            ctx.stage,
            failed.len(),
            ctx.node.previous_ids.len()
        )))
    }
}

/// Drains the task's SubTasks and settles its terminal status. Creates no
/// SubTask of its own, so the drain cannot wait on itself. On a successful
/// settle of a provisioning task the primary resource is promoted to
/// `Created`.
pub struct FinalizeTaskHandler;

#[async_trait]
impl StepHandler for FinalizeTaskHandler {
    fn name(&self) -> &'static str {
        "finalize_task"
    }

    fn creates_sub_task(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        let finalizer = TaskFinalizer::new(
            Arc::clone(&ctx.tasks),
            Arc::clone(&ctx.sub_tasks),
            Arc::clone(&ctx.config),
        );
        let status = finalizer.finalize(&ctx.task_id).await?;

        if status == TaskStatus::Success {
            promote_primary_resource(ctx);
        } else if let Some(task) = ctx.tasks.get(&ctx.task_id) {
            // Surface the dominant report message when nothing more
            // specific was recorded
            if task.message.is_empty() && !task.report.message.is_empty() {
                ctx.tasks.set_message(&ctx.task_id, task.report.message.clone());
            }
        }
        Ok(StepOutput::Done)
    }
}

fn promote_primary_resource(ctx: &StepContext) {
    let Some(task) = ctx.tasks.get(&ctx.task_id) else {
        return;
    };
    if task.action == TaskAction::Delete {
        return;
    }
    if let Some(name) = &task.resource_name {
        let key = ResourceKey::new(task.cloud_id.clone(), task.kind, name.clone());
        ctx.registry.set_status(&key, ResourceStatus::Created);
    }
}
