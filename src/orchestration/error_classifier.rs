//! # Failure Classification
//!
//! Routes a classified `ProvisionError` to its side effects: account
//! invalidation on auth failures, `Error*` resource status transitions on
//! the step's resource and on the task's primary resource, and severity
//! routing for the logs. Returns the message the caller should surface.

use crate::logging::log_error;
use crate::models::ResourceKey;
use crate::orchestration::types::{ProvisionError, StepContext};

/// Apply the registry and account side effects for a step failure and
/// return the user-visible message.
pub fn classify_failure(ctx: &StepContext, error: &ProvisionError) -> String {
    match error {
        ProvisionError::Auth(message) => {
            if let Some(account_id) = ctx.account_id() {
                ctx.registry.mark_account_invalid(account_id);
            }
            tracing::warn!(task_id = %ctx.task_id, message, "Authentication failure");
        }
        ProvisionError::Connect(message) => {
            tracing::info!(task_id = %ctx.task_id, message, "Provider unreachable");
        }
        ProvisionError::Execute { code, message } => {
            tracing::info!(task_id = %ctx.task_id, code, message, "Provider call failed");
        }
        ProvisionError::InvalidRequest(message) => {
            tracing::info!(task_id = %ctx.task_id, message, "Invalid request");
        }
        ProvisionError::TaskFailure(message) => {
            // Local bug or bad input, not an environmental condition
            log_error("step_executor", "TASK_FAILURE", message, Some(&ctx.task_id));
        }
        ProvisionError::WorkflowTerminated(message) => {
            tracing::warn!(task_id = %ctx.task_id, message, "Workflow terminated");
        }
    }

    apply_resource_error_statuses(ctx, error);
    error.user_message()
}

/// Move in-flight resource rows to their error statuses. Termination
/// signals carry no provider failure of their own, so they leave every row
/// as the failed predecessor left it.
fn apply_resource_error_statuses(ctx: &StepContext, error: &ProvisionError) {
    if matches!(error, ProvisionError::WorkflowTerminated(_)) {
        return;
    }

    if let Some(resource) = ctx.resource_from_metadata() {
        ctx.registry.apply_error_status(&resource.key());
    }

    // The task's primary resource reflects the failure even when a child
    // step caused it
    if let Some(task) = ctx.tasks.get(&ctx.task_id) {
        if let Some(name) = &task.resource_name {
            let primary = ResourceKey::new(task.cloud_id.clone(), task.kind, name.clone());
            ctx.registry.apply_error_status(&primary);
        }
    }
}
