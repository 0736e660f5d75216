//! # Step Executor
//!
//! The base wrapper around every handler invocation. It is the single place
//! the provisioning error taxonomy is caught: it resolves the task record
//! and cloud account, registers the SubTask, runs the handler on its own
//! tokio task so a panic becomes a failed SubTask rather than a crashed
//! worker, classifies failures, and persists everything before reporting
//! the outcome back to the coordinator.

use crate::logging::log_step_operation;
use crate::models::SubTask;
use crate::orchestration::error_classifier::classify_failure;
use crate::orchestration::types::{
    Attempt, ProvisionError, StepContext, StepOutcome, StepOutput,
};
use crate::registry::HandlerRegistry;
use crate::state_machine::{SubTaskStatus, TaskStatus};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub struct StepExecutor {
    handlers: Arc<HandlerRegistry>,
}

impl StepExecutor {
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self { handlers }
    }

    /// Run one step invocation to its outcome. Never panics outward and
    /// never leaves a SubTask unresolved behind a terminal outcome.
    pub async fn run(&self, ctx: StepContext, attempt: Attempt) -> StepOutcome {
        let node_id = ctx.node.id.to_string();
        log_step_operation(
            "step_started",
            Some(&ctx.task_id),
            Some(&node_id),
            Some(&ctx.node.step_kind.to_string()),
            "RUNNING",
            None,
        );

        // A vanished task record means the whole workflow must stop
        if !ctx.tasks.exists(&ctx.task_id) {
            return self
                .fail(
                    &ctx,
                    ProvisionError::WorkflowTerminated(format!(
                        "task {} not found",
                        ctx.task_id
                    )),
                )
                .await;
        }
        if let Some(account_id) = ctx.account_id() {
            if ctx.registry.account(account_id).is_none() {
                return self
                    .fail(
                        &ctx,
                        ProvisionError::WorkflowTerminated(format!(
                            "cloud account {account_id} not found"
                        )),
                    )
                    .await;
            }
        }

        let handler = match self
            .handlers
            .resolve(ctx.node.resource_kind, ctx.node.step_kind)
        {
            Ok(handler) => handler,
            Err(err) => {
                return self.fail(&ctx, ProvisionError::TaskFailure(err.to_string())).await;
            }
        };

        if attempt == Attempt::Dispatch && handler.creates_sub_task() {
            let sub_task_id = ctx.sub_tasks.insert(SubTask::new(&ctx.task_id));
            remember_sub_task(&ctx, sub_task_id);
        }

        // Handlers run on their own task so a panic resolves the SubTask
        // FAILED instead of taking the worker down
        let exec_ctx = ctx.clone();
        let join = tokio::spawn(async move {
            match attempt {
                Attempt::Dispatch => handler.execute(&exec_ctx).await,
                Attempt::Poll => handler.poll(&exec_ctx).await,
            }
        });
        let result = match join.await {
            Ok(result) => result,
            Err(join_err) => Err(ProvisionError::TaskFailure(format!(
                "step handler panicked: {join_err}"
            ))),
        };

        match result {
            Ok(StepOutput::Done) => {
                self.resolve_sub_task(&ctx, SubTaskStatus::Success);
                log_step_operation(
                    "step_completed",
                    Some(&ctx.task_id),
                    Some(&node_id),
                    Some(&ctx.node.step_kind.to_string()),
                    "SUCCESS",
                    None,
                );
                StepOutcome::Succeeded
            }
            Ok(StepOutput::Waiting) => {
                // SubTask stays RUNNING until the poll settles
                log_step_operation(
                    "step_waiting",
                    Some(&ctx.task_id),
                    Some(&node_id),
                    Some(&ctx.node.step_kind.to_string()),
                    "RUNNING_WAIT",
                    None,
                );
                StepOutcome::Waiting
            }
            Err(error) => self.fail(&ctx, error).await,
        }
    }

    async fn fail(&self, ctx: &StepContext, error: ProvisionError) -> StepOutcome {
        let message = classify_failure(ctx, &error);
        self.resolve_sub_task(ctx, SubTaskStatus::Failed);

        if matches!(error, ProvisionError::WorkflowTerminated(_)) {
            // The whole task stops here, not just this step
            ctx.tasks.with_task_mut(&ctx.task_id, |task| {
                task.apply_status(TaskStatus::Failed);
                task.message = message.clone();
            });
        }

        log_step_operation(
            "step_failed",
            Some(&ctx.task_id),
            Some(&ctx.node.id.to_string()),
            Some(&ctx.node.step_kind.to_string()),
            "FAILED",
            Some(&message),
        );
        StepOutcome::Failed(error)
    }

    fn resolve_sub_task(&self, ctx: &StepContext, status: SubTaskStatus) {
        if let Some(sub_task_id) = recorded_sub_task(ctx) {
            ctx.sub_tasks.resolve(sub_task_id, status);
        }
    }
}

/// Persist the SubTask id on the node so poll re-invocations and failure
/// paths resolve the same record
fn remember_sub_task(ctx: &StepContext, sub_task_id: Uuid) {
    ctx.workflows.with_node_mut(ctx.node.id, |node| {
        if !node.task_metadata.is_object() {
            node.task_metadata = json!({});
        }
        node.task_metadata["sub_task_id"] = json!(sub_task_id);
    });
}

fn recorded_sub_task(ctx: &StepContext) -> Option<Uuid> {
    let node = ctx.workflows.node(ctx.node.id)?;
    serde_json::from_value(node.task_metadata.get("sub_task_id")?.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::models::resources::ResourceKind;
    use crate::models::{StepKind, TaskAction, TaskRecord, WorkflowTask};
    use crate::registry::ResourceRegistry;
    use crate::services::MockGateway;
    use crate::store::{SubTaskStore, TaskStore, WorkflowStore};
    use async_trait::async_trait;

    struct AlwaysSucceeds;

    #[async_trait]
    impl crate::orchestration::StepHandler for AlwaysSucceeds {
        fn name(&self) -> &'static str {
            "always_succeeds"
        }

        async fn execute(&self, _ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
            Ok(StepOutput::Done)
        }
    }

    struct Panics;

    #[async_trait]
    impl crate::orchestration::StepHandler for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }

        async fn execute(&self, _ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
            panic!("handler bug")
        }
    }

    fn context_for(node: WorkflowTask, task_id: &str) -> (StepContext, Arc<HandlerRegistry>) {
        let tasks = Arc::new(TaskStore::new());
        tasks.insert(TaskRecord::new(
            task_id,
            ResourceKind::Vpc,
            TaskAction::Add,
            "cloud-1",
        ));
        let workflows = Arc::new(WorkflowStore::new());
        workflows.insert_node(node.clone());

        let handlers = Arc::new(HandlerRegistry::new());
        let ctx = StepContext {
            node,
            task_id: task_id.to_string(),
            stage: "PROVISIONING".to_string(),
            tasks,
            sub_tasks: Arc::new(SubTaskStore::new()),
            workflows,
            registry: Arc::new(ResourceRegistry::new()),
            gateway: Arc::new(MockGateway::new()),
            config: Arc::new(OrchestratorConfig::default()),
        };
        (ctx, handlers)
    }

    #[tokio::test]
    async fn test_success_resolves_sub_task() {
        let node = WorkflowTask::new(StepKind::Create, ResourceKind::Vpc, "vpc-1");
        let (ctx, handlers) = context_for(node, "task-1");
        handlers.register(ResourceKind::Vpc, StepKind::Create, Arc::new(AlwaysSucceeds));

        let executor = StepExecutor::new(handlers);
        let outcome = executor.run(ctx.clone(), Attempt::Dispatch).await;

        assert_eq!(outcome, StepOutcome::Succeeded);
        let sub_tasks = ctx.sub_tasks.for_task("task-1");
        assert_eq!(sub_tasks.len(), 1);
        assert_eq!(sub_tasks[0].status, SubTaskStatus::Success);
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_sub_task() {
        let node = WorkflowTask::new(StepKind::Create, ResourceKind::Vpc, "vpc-1");
        let (ctx, handlers) = context_for(node, "task-1");
        handlers.register(ResourceKind::Vpc, StepKind::Create, Arc::new(Panics));

        let executor = StepExecutor::new(handlers);
        let outcome = executor.run(ctx.clone(), Attempt::Dispatch).await;

        assert!(matches!(
            outcome,
            StepOutcome::Failed(ProvisionError::TaskFailure(_))
        ));
        let sub_tasks = ctx.sub_tasks.for_task("task-1");
        assert_eq!(sub_tasks[0].status, SubTaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_task_terminates_workflow() {
        let node = WorkflowTask::new(StepKind::Create, ResourceKind::Vpc, "vpc-1");
        let (mut ctx, handlers) = context_for(node, "task-1");
        ctx.task_id = "task-404".to_string();
        handlers.register(ResourceKind::Vpc, StepKind::Create, Arc::new(AlwaysSucceeds));

        let executor = StepExecutor::new(handlers);
        let outcome = executor.run(ctx, Attempt::Dispatch).await;

        assert!(matches!(
            outcome,
            StepOutcome::Failed(ProvisionError::WorkflowTerminated(_))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_handler_is_task_failure() {
        let node = WorkflowTask::new(StepKind::Delete, ResourceKind::Subnet, "subnet-1");
        let (ctx, handlers) = context_for(node, "task-1");

        let executor = StepExecutor::new(handlers);
        let outcome = executor.run(ctx.clone(), Attempt::Dispatch).await;

        assert!(matches!(
            outcome,
            StepOutcome::Failed(ProvisionError::TaskFailure(_))
        ));
        // The user-visible message is masked for internal failures
        let task = ctx.tasks.get("task-1").unwrap();
        assert_ne!(task.message, "no handler registered");
    }
}
