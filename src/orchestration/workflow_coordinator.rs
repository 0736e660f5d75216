//! # Workflow Coordinator
//!
//! Drives workflow roots through their lifecycle: dispatches the entry
//! wave, walks the DAG frontier as nodes settle, propagates failures to
//! not-yet-dispatched successors, truncates the tree on termination
//! signals, evaluates the root's terminal status, and triggers callback
//! roots with the Wfc gate.
//!
//! All state lives in the stores; the coordinator itself is stateless and
//! safe to call from every worker concurrently.

use crate::config::{OrchestratorConfig, RetryPolicy};
use crate::constants::stages;
use crate::constants::system::SKIPPED_PREDECESSOR_FAILED;
use crate::error::{CoreError, Result};
use crate::logging::log_task_operation;
use crate::messaging::StepQueue;
use crate::models::{WorkflowRoot, WorkflowTask};
use crate::orchestration::error_classifier::classify_failure;
use crate::orchestration::reporting::{ReportUpdate, ReportWriter};
use crate::orchestration::step_executor::StepExecutor;
use crate::orchestration::types::{Attempt, ProvisionError, StepContext, StepOutcome, StepRequest};
use crate::registry::{HandlerRegistry, ResourceRegistry};
use crate::services::CloudGateway;
use crate::state_machine::{
    evaluate_nodes, node_target_state, root_target_state, NodeEvent, NodeState, ReportStatus,
    RootEvaluation, RootEvent, SubTaskStatus,
};
use crate::store::{SubTaskStore, TaskStore, WorkflowStore};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

pub struct WorkflowCoordinator {
    pub tasks: Arc<TaskStore>,
    pub sub_tasks: Arc<SubTaskStore>,
    pub workflows: Arc<WorkflowStore>,
    pub registry: Arc<ResourceRegistry>,
    pub gateway: Arc<dyn CloudGateway>,
    pub config: Arc<OrchestratorConfig>,
    pub report: ReportWriter,
    executor: StepExecutor,
    queue: StepQueue,
}

impl WorkflowCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<TaskStore>,
        sub_tasks: Arc<SubTaskStore>,
        workflows: Arc<WorkflowStore>,
        registry: Arc<ResourceRegistry>,
        handlers: Arc<HandlerRegistry>,
        gateway: Arc<dyn CloudGateway>,
        config: Arc<OrchestratorConfig>,
        queue: StepQueue,
    ) -> Self {
        Self {
            report: ReportWriter::new(Arc::clone(&tasks)),
            executor: StepExecutor::new(handlers),
            tasks,
            sub_tasks,
            workflows,
            registry,
            gateway,
            config,
            queue,
        }
    }

    /// Initiate a root and dispatch its entry wave
    pub async fn start_root(&self, root_id: Uuid) -> Result<()> {
        self.apply_root_event(root_id, &RootEvent::Initiate)?;

        let entries = self.workflows.entry_nodes(root_id);
        if entries.is_empty() {
            return Err(CoreError::OrchestrationError(format!(
                "root {root_id} has no entry nodes"
            )));
        }
        for node in entries {
            self.dispatch_node(node.id).await?;
        }
        Ok(())
    }

    /// Process one queued step request. Called by the worker pool.
    pub async fn process(&self, request: StepRequest) {
        let Some(node) = self.workflows.node(request.node_id) else {
            tracing::warn!(node_id = %request.node_id, "Dropping request for unknown node");
            return;
        };
        // Truncation may have settled the node while the message was queued
        if node.status.is_terminal() {
            return;
        }
        let Some(root) = self.workflows.root(node.root_id) else {
            tracing::warn!(root_id = %node.root_id, "Dropping request for unknown root");
            return;
        };
        if root.terminated {
            return;
        }

        let start_event = match request.attempt {
            Attempt::Dispatch => NodeEvent::Start,
            Attempt::Poll => NodeEvent::PollStart,
        };
        if self.apply_node_event(node.id, &start_event).is_err() {
            return;
        }
        let _ = self
            .workflows
            .with_root_mut(root.id, |r| {
                if let Ok(next) = root_target_state(r.status, &RootEvent::TaskStarted) {
                    r.status = next;
                }
            });

        let ctx = self.context_for(&root, node.id);
        let Some(ctx) = ctx else {
            return;
        };
        let outcome = self.executor.run(ctx, request.attempt).await;
        self.handle_outcome(request.node_id, outcome).await;
    }

    async fn handle_outcome(&self, node_id: Uuid, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Succeeded => {
                if self.apply_node_event(node_id, &NodeEvent::Succeed).is_ok() {
                    self.advance_successors(node_id).await;
                }
                self.evaluate_root_of(node_id).await;
            }
            StepOutcome::Waiting => self.handle_waiting(node_id).await,
            StepOutcome::Failed(error) => self.handle_failure(node_id, error).await,
        }
    }

    /// Node must poll before resolving: bounded attempts with a fixed sleep
    /// from the node's named policy, then a fatal failure.
    async fn handle_waiting(&self, node_id: Uuid) {
        let policy = self.policy_for(node_id);
        let attempts = self
            .workflows
            .with_node_mut(node_id, |node| {
                node.wait_attempts += 1;
                node.wait_attempts
            })
            .unwrap_or(0);

        if attempts > policy.max_attempts {
            self.fail_exhausted_wait(node_id).await;
            return;
        }

        if self.apply_node_event(node_id, &NodeEvent::Wait).is_err() {
            return;
        }

        let queue = self.queue.clone();
        let interval = policy.interval();
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = queue.send(StepRequest::poll(node_id)).await;
        });
    }

    /// The wait budget ran out. The failure takes the same classification
    /// path as any handler failure: registry rows move to their error
    /// statuses and the report records the stuck resource.
    async fn fail_exhausted_wait(&self, node_id: Uuid) {
        let error = ProvisionError::TaskFailure(
            "resource did not stabilize within the polling budget".to_string(),
        );
        let ctx = self
            .workflows
            .node(node_id)
            .and_then(|node| self.workflows.root(node.root_id))
            .and_then(|root| self.context_for(&root, node_id));
        if let Some(ctx) = ctx {
            let message = classify_failure(&ctx, &error);
            let _ = self.report.update_reporting(
                &ctx.task_id,
                ReportUpdate::new(
                    &ctx.stage,
                    ctx.node.resource_kind,
                    &ctx.node.resource_name,
                    ReportStatus::Failed,
                    message,
                ),
            );
        }
        self.resolve_sub_task_failed(node_id);
        self.handle_failure(node_id, error).await;
    }

    async fn handle_failure(&self, node_id: Uuid, error: ProvisionError) {
        let message = error.user_message();
        let _ = self.apply_node_event(node_id, &NodeEvent::fail_with_error(message));

        if matches!(error, ProvisionError::WorkflowTerminated(_)) {
            if let Some(node) = self.workflows.node(node_id) {
                self.truncate_root(node.root_id, &error.user_message());
            }
        } else {
            let skipped = self.propagate_skips(node_id);
            self.advance_successors(node_id).await;
            for skipped_id in skipped {
                self.advance_successors(skipped_id).await;
            }
        }
        self.evaluate_root_of(node_id).await;
    }

    /// Fail every not-yet-terminal node of the root and suppress callback
    /// triggering. The forced task FAILED write already happened in the
    /// executor.
    fn truncate_root(&self, root_id: Uuid, message: &str) {
        for node in self.workflows.nodes_for_root(root_id) {
            if !node.status.is_terminal() {
                let _ = self.apply_node_event(node.id, &NodeEvent::fail_with_error(message));
                self.resolve_sub_task_failed(node.id);
            }
        }
        self.workflows.with_root_mut(root_id, |root| {
            root.terminated = true;
        });
        if let Some(root) = self.workflows.root(root_id) {
            log_task_operation(
                "workflow_truncated",
                Some(&root.task_id),
                None,
                "FAILED",
                Some(message),
            );
        }
    }

    /// Mark transitive Pending successors of a failed node as skipped so
    /// the root can settle. Traversal stops at `run_on_failure` nodes: they
    /// still get dispatched to observe the failure.
    fn propagate_skips(&self, from: Uuid) -> Vec<Uuid> {
        let mut skipped = Vec::new();
        let mut queue: VecDeque<Uuid> = self
            .workflows
            .node(from)
            .map(|n| n.next_ids.into())
            .unwrap_or_default();

        while let Some(next_id) = queue.pop_front() {
            let Some(next) = self.workflows.node(next_id) else {
                continue;
            };
            if next.run_on_failure || next.status != NodeState::Pending {
                continue;
            }
            if self
                .apply_node_event(next_id, &NodeEvent::fail_with_error(SKIPPED_PREDECESSOR_FAILED))
                .is_ok()
            {
                skipped.push(next_id);
                queue.extend(next.next_ids);
            }
        }
        skipped
    }

    /// Dispatch every Pending successor whose predecessors have all
    /// settled, honoring the `run_on_failure` gate
    async fn advance_successors(&self, node_id: Uuid) {
        let Some(node) = self.workflows.node(node_id) else {
            return;
        };
        for next_id in node.next_ids {
            let Some(next) = self.workflows.node(next_id) else {
                continue;
            };
            if next.status != NodeState::Pending {
                continue;
            }
            let predecessors: Vec<NodeState> = next
                .previous_ids
                .iter()
                .filter_map(|id| self.workflows.node(*id))
                .map(|n| n.status)
                .collect();

            let all_terminal = predecessors.iter().all(|s| s.is_terminal());
            let all_successful = predecessors.iter().all(|s| *s == NodeState::Successful);
            if all_terminal && (all_successful || next.run_on_failure) {
                if let Err(err) = self.dispatch_node(next_id).await {
                    tracing::error!(node_id = %next_id, error = %err, "Dispatch failed");
                }
            }
        }
    }

    async fn dispatch_node(&self, node_id: Uuid) -> Result<()> {
        self.apply_node_event(node_id, &NodeEvent::Dispatch)?;
        self.workflows.with_node_mut(node_id, |node| {
            node.in_focus = true;
        });
        self.queue.send(StepRequest::dispatch(node_id)).await
    }

    /// Settle the root once no node remains in flight
    async fn evaluate_root_of(&self, node_id: Uuid) {
        let Some(node) = self.workflows.node(node_id) else {
            return;
        };
        let root_id = node.root_id;
        match evaluate_nodes(&self.workflows.node_states_for_root(root_id)) {
            RootEvaluation::InFlight => {}
            RootEvaluation::AllSuccessful => self.complete_root(root_id, true).await,
            RootEvaluation::SettledWithFailure => self.complete_root(root_id, false).await,
        }
    }

    async fn complete_root(&self, root_id: Uuid, succeeded: bool) {
        let Some(root) = self.workflows.root(root_id) else {
            return;
        };
        if root.status.is_settled() {
            return;
        }

        // The callbacks this outcome releases are decided up front: the
        // completion event must land before any of them starts, so the
        // parent snapshot they receive carries the terminal status
        let released: Vec<WorkflowRoot> = if root.terminated {
            Vec::new()
        } else {
            self.workflows
                .callbacks_for_root(root_id)
                .into_iter()
                .filter(|cb| {
                    cb.root_kind.triggers_on(succeeded)
                        && root_target_state(cb.status, &RootEvent::Trigger).is_ok()
                })
                .collect()
        };
        let holding = released
            .iter()
            .filter(|cb| cb.hold_parent_status_update)
            .count();
        let waiting_for_callbacks = holding > 0;

        let event = if succeeded {
            RootEvent::CompleteSuccessfully {
                waiting_for_callbacks,
            }
        } else {
            RootEvent::CompleteWithFailure {
                waiting_for_callbacks,
            }
        };
        if let Err(err) = self.apply_root_event(root_id, &event) {
            tracing::error!(root_id = %root_id, error = %err, "Root completion rejected");
            return;
        }

        log_task_operation(
            "root_settled",
            Some(&root.task_id),
            None,
            if succeeded { "SUCCESS" } else { "FAILED" },
            Some(&format!("holding_callbacks={holding}")),
        );

        self.trigger_callbacks(root_id, released).await;

        // A settling callback may be the last gate on its parent
        if !waiting_for_callbacks {
            if let Some(parent_id) = root.parent_id {
                self.resolve_parent_gate(parent_id).await;
            }
        }
    }

    async fn trigger_callbacks(&self, parent_id: Uuid, callbacks: Vec<WorkflowRoot>) {
        if callbacks.is_empty() {
            return;
        }
        // Captured after the completion event, so the copy records the
        // status the callbacks were triggered on
        let Some(snapshot) = self.workflows.root(parent_id).map(|r| r.to_snapshot()) else {
            return;
        };
        for callback in callbacks {
            let triggered = self.workflows.with_root_mut(callback.id, |cb| {
                match root_target_state(cb.status, &RootEvent::Trigger) {
                    Ok(next) => {
                        cb.status = next;
                        cb.parent_root_copy = Some(snapshot.clone());
                        true
                    }
                    Err(_) => false,
                }
            });
            if triggered == Some(true) {
                if let Err(err) = Box::pin(self.start_root(callback.id)).await {
                    tracing::error!(
                        root_id = %callback.id,
                        error = %err,
                        "Callback root failed to start"
                    );
                }
            }
        }
    }

    /// Flip a parent out of its Wfc status once no holding callback remains
    async fn resolve_parent_gate(&self, parent_id: Uuid) {
        if self.workflows.holding_callbacks_count(parent_id) > 0 {
            return;
        }
        let _ = self.apply_root_event(parent_id, &RootEvent::CallbacksResolved);
    }

    fn context_for(&self, root: &WorkflowRoot, node_id: Uuid) -> Option<StepContext> {
        let node = self.workflows.node(node_id)?;
        let stage = node
            .task_metadata
            .get("stage")
            .and_then(|v| v.as_str())
            .unwrap_or(stages::PROVISIONING)
            .to_string();
        Some(StepContext {
            node,
            task_id: root.task_id.clone(),
            stage,
            tasks: Arc::clone(&self.tasks),
            sub_tasks: Arc::clone(&self.sub_tasks),
            workflows: Arc::clone(&self.workflows),
            registry: Arc::clone(&self.registry),
            gateway: Arc::clone(&self.gateway),
            config: Arc::clone(&self.config),
        })
    }

    fn policy_for(&self, node_id: Uuid) -> RetryPolicy {
        self.workflows
            .node(node_id)
            .and_then(|node| node.operation)
            .map(|operation| self.config.retry_policy(operation))
            .unwrap_or(RetryPolicy::new(10, 3_000))
    }

    fn apply_node_event(&self, node_id: Uuid, event: &NodeEvent) -> Result<()> {
        let applied = self.workflows.with_node_mut(node_id, |node| {
            let next = node_target_state(node.status, event).map_err(|e| {
                CoreError::StateTransitionError(e.to_string())
            })?;
            node.status = next;
            if let Some(message) = event.error_message() {
                node.message = message.to_string();
            }
            if next.is_terminal() {
                node.in_focus = false;
            }
            Ok(())
        });
        applied.unwrap_or_else(|| {
            Err(CoreError::OrchestrationError(format!(
                "node {node_id} not found"
            )))
        })
    }

    fn apply_root_event(&self, root_id: Uuid, event: &RootEvent) -> Result<()> {
        let applied = self.workflows.with_root_mut(root_id, |root| {
            let next = root_target_state(root.status, event).map_err(|e| {
                CoreError::StateTransitionError(e.to_string())
            })?;
            root.status = next;
            Ok(())
        });
        applied.unwrap_or_else(|| {
            Err(CoreError::OrchestrationError(format!(
                "root {root_id} not found"
            )))
        })
    }

    fn resolve_sub_task_failed(&self, node_id: Uuid) {
        let Some(node) = self.workflows.node(node_id) else {
            return;
        };
        let Some(sub_task_id) = node
            .task_metadata
            .get("sub_task_id")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
        else {
            return;
        };
        self.sub_tasks.resolve(sub_task_id, SubTaskStatus::Failed);
    }
}
