//! # Report Aggregator
//!
//! Maintains the hierarchical status/message tree embedded in every task
//! record. `update_reporting` is the single mutation entry point; it writes
//! at the resource or sub-step level and cascades terminal statuses upward
//! through resource type, stage and the report root under the FAILED
//! dominance rule. `stop_reporting` is the catastrophic escape hatch that
//! guarantees a report never sticks mid-update.
//!
//! All mutation happens inside the task row lock, which makes concurrent
//! sibling updates to the same report well-ordered.

use crate::constants::system::INTERNAL_ERROR_MESSAGE;
use crate::error::{CoreError, Result};
use crate::models::report::{Report, StageNode, TypeNode};
use crate::models::resources::ResourceKind;
use crate::state_machine::{ReportStatus, TaskStatus};
use crate::store::TaskStore;
use std::sync::Arc;

/// One report mutation: the resource it targets, where it sits in the
/// tree, and the status/message to write. `sub_step` narrows the write to
/// a named sub-step under the resource.
#[derive(Debug, Clone)]
pub struct ReportUpdate {
    pub stage: String,
    pub resource_kind: ResourceKind,
    pub resource_name: String,
    pub status: ReportStatus,
    pub message: String,
    pub sub_step: Option<String>,
}

impl ReportUpdate {
    pub fn new(
        stage: impl Into<String>,
        resource_kind: ResourceKind,
        resource_name: impl Into<String>,
        status: ReportStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            resource_kind,
            resource_name: resource_name.into(),
            status,
            message: message.into(),
            sub_step: None,
        }
    }

    pub fn at_sub_step(mut self, sub_step: impl Into<String>) -> Self {
        self.sub_step = Some(sub_step.into());
        self
    }
}

pub struct ReportWriter {
    tasks: Arc<TaskStore>,
}

impl ReportWriter {
    pub fn new(tasks: Arc<TaskStore>) -> Self {
        Self { tasks }
    }

    /// Pre-register a pending resource entry (and optional sub-steps) so
    /// the skeleton is visible before any step runs
    pub fn ensure_resource(
        &self,
        task_id: &str,
        stage: &str,
        kind: ResourceKind,
        resource_name: &str,
        sub_steps: &[&str],
    ) {
        self.tasks.with_task_mut(task_id, |task| {
            let type_node = task.report.stage_mut(stage).type_mut(kind.report_label());
            if type_node.resource(resource_name).is_none() {
                type_node.add_resource(resource_name);
            }
            if let Some(resource) = type_node.resource_mut(resource_name) {
                for sub_step in sub_steps {
                    if !resource.steps.contains_key(*sub_step) {
                        resource.add_sub_step(*sub_step);
                    }
                }
            }
        });
    }

    /// The single report mutation entry point. Failures inside the update
    /// trigger `stop_reporting` so the report cannot stick mid-update.
    pub fn update_reporting(&self, task_id: &str, update: ReportUpdate) -> Result<()> {
        let applied = self
            .tasks
            .with_task_mut(task_id, |task| apply_update(&mut task.report, &update));

        match applied {
            Some(Ok(())) => Ok(()),
            Some(Err(err)) => {
                tracing::error!(task_id, error = %err, "Report update failed, stopping report");
                self.stop_reporting(task_id, INTERNAL_ERROR_MESSAGE);
                Err(err)
            }
            None => Err(CoreError::OrchestrationError(format!(
                "task {task_id} not found for report update"
            ))),
        }
    }

    /// Catastrophic-failure escape hatch: every PENDING node becomes
    /// CANCELLED, every IN_PROGRESS node becomes FAILED, and the task is
    /// forced FAILED with the given message.
    pub fn stop_reporting(&self, task_id: &str, message: &str) {
        self.tasks.with_task_mut(task_id, |task| {
            for stage in task.report.stages.values_mut() {
                for type_node in stage.steps.values_mut() {
                    for resource in &mut type_node.steps {
                        for sub_step in resource.steps.values_mut() {
                            sub_step.status = stop_status(sub_step.status);
                        }
                        resource.status = stop_status(resource.status);
                    }
                    type_node.status = stop_status(type_node.status);
                }
                stage.status = stop_status(stage.status);
            }
            task.report.status = ReportStatus::Failed;
            task.report.message = message.to_string();
            task.apply_status(TaskStatus::Failed);
            task.message = message.to_string();
        });
    }
}

fn stop_status(status: ReportStatus) -> ReportStatus {
    match status {
        ReportStatus::Pending => ReportStatus::Cancelled,
        ReportStatus::InProgress => ReportStatus::Failed,
        settled => settled,
    }
}

fn apply_update(report: &mut Report, update: &ReportUpdate) -> Result<()> {
    let stage = report.stage_mut(&update.stage);
    let type_node = stage.type_mut(update.resource_kind.report_label());

    let resource = type_node
        .resource_mut(&update.resource_name)
        .ok_or_else(|| {
            CoreError::OrchestrationError(format!(
                "resource {} not present under {} / {}",
                update.resource_name,
                update.stage,
                update.resource_kind.report_label()
            ))
        })?;

    match &update.sub_step {
        Some(sub_step_name) => {
            let sub_step = resource.steps.entry(sub_step_name.clone()).or_default();
            sub_step.status = update.status;
            sub_step.message = update.message.clone();

            // A failed sub-step invalidates the resource's remaining
            // in-flight sub-work and fails the resource itself
            if update.status == ReportStatus::Failed {
                for (name, sibling) in resource.steps.iter_mut() {
                    if name != sub_step_name
                        && matches!(
                            sibling.status,
                            ReportStatus::Pending | ReportStatus::InProgress
                        )
                    {
                        sibling.status = ReportStatus::Cancelled;
                    }
                }
                resource.status = ReportStatus::Failed;
                resource.message = update.message.clone();
            }
        }
        None => {
            resource.status = update.status;
            resource.message = update.message.clone();
        }
    }

    if update.status == ReportStatus::InProgress {
        // Surface activity upward without resolving anything
        if type_node.status == ReportStatus::Pending {
            type_node.status = ReportStatus::InProgress;
        }
        if stage.status == ReportStatus::Pending {
            stage.status = ReportStatus::InProgress;
        }
        if report.status == ReportStatus::Pending {
            report.status = ReportStatus::InProgress;
        }
        return Ok(());
    }

    rollup_type(type_node, update.resource_kind);
    rollup_stage(stage);
    rollup_report(report);
    Ok(())
}

/// Aggregate resource statuses into the type summary. FAILED dominates once
/// no sibling remains unresolved; PENDING siblings of a failure are swept
/// to CANCELLED.
fn rollup_type(type_node: &mut TypeNode, kind: ResourceKind) {
    let any_failed = type_node
        .steps
        .iter()
        .any(|r| r.status == ReportStatus::Failed);

    if any_failed {
        for resource in &mut type_node.steps {
            if resource.status == ReportStatus::Pending {
                resource.status = ReportStatus::Cancelled;
            }
        }
    }

    let any_unresolved = type_node.steps.iter().any(|r| {
        matches!(
            r.status,
            ReportStatus::Pending | ReportStatus::InProgress
        )
    });
    if any_unresolved {
        return;
    }

    type_node.status = if any_failed {
        ReportStatus::Failed
    } else {
        ReportStatus::Success
    };

    // Singleton kinds speak for themselves; collections get an aggregate
    // pointer to the per-resource entries
    if kind.is_singleton_per_task() {
        if let Some(only) = type_node.steps.first() {
            type_node.message = only.message.clone();
        }
    } else if any_failed {
        type_node.message = "One or more steps failed, check individual resources".to_string();
    } else {
        type_node.message = "Completed successfully".to_string();
    }
}

fn rollup_stage(stage: &mut StageNode) {
    let any_failed = stage
        .steps
        .values()
        .any(|t| t.status == ReportStatus::Failed);

    if any_failed {
        for type_node in stage.steps.values_mut() {
            if type_node.status == ReportStatus::Pending {
                type_node.status = ReportStatus::Cancelled;
            }
        }
    }

    let any_unresolved = stage.steps.values().any(|t| {
        matches!(
            t.status,
            ReportStatus::Pending | ReportStatus::InProgress
        )
    });
    if any_unresolved {
        return;
    }

    if any_failed {
        stage.status = ReportStatus::Failed;
        if let Some(failed) = stage
            .steps
            .values()
            .find(|t| t.status == ReportStatus::Failed)
        {
            stage.message = failed.message.clone();
        }
    } else {
        stage.status = ReportStatus::Success;
    }
}

fn rollup_report(report: &mut Report) {
    let any_failed = report
        .stages
        .values()
        .any(|s| s.status == ReportStatus::Failed);

    if any_failed {
        for stage in report.stages.values_mut() {
            if stage.status == ReportStatus::Pending {
                stage.status = ReportStatus::Cancelled;
            }
        }
    }

    let any_unresolved = report.stages.values().any(|s| {
        matches!(
            s.status,
            ReportStatus::Pending | ReportStatus::InProgress
        )
    });
    if any_unresolved {
        return;
    }

    report.status = if any_failed {
        ReportStatus::Failed
    } else {
        ReportStatus::Success
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::stages::PROVISIONING;
    use crate::models::{TaskAction, TaskRecord};

    fn writer_with_task(task_id: &str) -> (ReportWriter, Arc<TaskStore>) {
        let tasks = Arc::new(TaskStore::new());
        tasks.insert(TaskRecord::new(
            task_id,
            ResourceKind::Vpc,
            TaskAction::Add,
            "cloud-1",
        ));
        (ReportWriter::new(Arc::clone(&tasks)), tasks)
    }

    fn subnet_update(name: &str, status: ReportStatus, message: &str) -> ReportUpdate {
        ReportUpdate::new(PROVISIONING, ResourceKind::Subnet, name, status, message)
    }

    #[test]
    fn test_all_success_rolls_up() {
        let (writer, tasks) = writer_with_task("task-1");
        writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Subnet, "subnet-1", &[]);
        writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Subnet, "subnet-2", &[]);

        writer
            .update_reporting("task-1", subnet_update("subnet-1", ReportStatus::Success, "ok"))
            .unwrap();
        writer
            .update_reporting("task-1", subnet_update("subnet-2", ReportStatus::Success, "ok"))
            .unwrap();

        let report = tasks.get("task-1").unwrap().report;
        let stage = report.stage(PROVISIONING).unwrap();
        assert_eq!(stage.status, ReportStatus::Success);
        assert_eq!(
            stage.type_node("Subnets").unwrap().status,
            ReportStatus::Success
        );
        assert_eq!(report.status, ReportStatus::Success);
    }

    #[test]
    fn test_failed_dominates_once_siblings_resolve() {
        let (writer, tasks) = writer_with_task("task-1");
        writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Subnet, "subnet-1", &[]);
        writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Subnet, "subnet-2", &[]);

        writer
            .update_reporting(
                "task-1",
                subnet_update("subnet-1", ReportStatus::InProgress, ""),
            )
            .unwrap();
        writer
            .update_reporting(
                "task-1",
                subnet_update("subnet-2", ReportStatus::Failed, "already exists"),
            )
            .unwrap();

        // subnet-1 still in flight: the type stays unresolved
        let report = tasks.get("task-1").unwrap().report;
        let type_node = report
            .stage(PROVISIONING)
            .unwrap()
            .type_node("Subnets")
            .unwrap();
        assert_ne!(type_node.status, ReportStatus::Failed);

        writer
            .update_reporting("task-1", subnet_update("subnet-1", ReportStatus::Success, "ok"))
            .unwrap();

        let report = tasks.get("task-1").unwrap().report;
        let stage = report.stage(PROVISIONING).unwrap();
        let type_node = stage.type_node("Subnets").unwrap();
        assert_eq!(type_node.status, ReportStatus::Failed);
        assert_eq!(stage.status, ReportStatus::Failed);
        assert_eq!(report.status, ReportStatus::Failed);
    }

    #[test]
    fn test_pending_siblings_swept_to_cancelled() {
        let (writer, tasks) = writer_with_task("task-1");
        for name in ["subnet-1", "subnet-2", "subnet-3"] {
            writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Subnet, name, &[]);
        }

        writer
            .update_reporting(
                "task-1",
                subnet_update("subnet-1", ReportStatus::Failed, "quota exceeded"),
            )
            .unwrap();

        let report = tasks.get("task-1").unwrap().report;
        let type_node = report
            .stage(PROVISIONING)
            .unwrap()
            .type_node("Subnets")
            .unwrap();
        assert_eq!(type_node.status, ReportStatus::Failed);
        assert_eq!(
            type_node.resource("subnet-2").unwrap().status,
            ReportStatus::Cancelled
        );
        assert_eq!(
            type_node.resource("subnet-3").unwrap().status,
            ReportStatus::Cancelled
        );
    }

    #[test]
    fn test_sub_step_failure_invalidates_siblings() {
        let (writer, tasks) = writer_with_task("task-1");
        writer.ensure_resource(
            "task-1",
            "DELETION",
            ResourceKind::VpnGateway,
            "gw-1",
            &["Detach Connections", "Delete Gateway"],
        );

        writer
            .update_reporting(
                "task-1",
                ReportUpdate::new(
                    "DELETION",
                    ResourceKind::VpnGateway,
                    "gw-1",
                    ReportStatus::Failed,
                    "connection busy",
                )
                .at_sub_step("Detach Connections"),
            )
            .unwrap();

        let report = tasks.get("task-1").unwrap().report;
        let resource = report
            .stage("DELETION")
            .unwrap()
            .type_node("VPN Gateways")
            .unwrap()
            .resource("gw-1")
            .unwrap();
        assert_eq!(resource.status, ReportStatus::Failed);
        assert_eq!(
            resource.steps["Detach Connections"].status,
            ReportStatus::Failed
        );
        assert_eq!(
            resource.steps["Delete Gateway"].status,
            ReportStatus::Cancelled
        );
    }

    #[test]
    fn test_singleton_kind_uses_own_message() {
        let (writer, tasks) = writer_with_task("task-1");
        writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Vpc, "test-vpc", &[]);

        writer
            .update_reporting(
                "task-1",
                ReportUpdate::new(
                    PROVISIONING,
                    ResourceKind::Vpc,
                    "test-vpc",
                    ReportStatus::Success,
                    "VPC created",
                ),
            )
            .unwrap();

        let report = tasks.get("task-1").unwrap().report;
        let type_node = report
            .stage(PROVISIONING)
            .unwrap()
            .type_node("VPC")
            .unwrap();
        assert_eq!(type_node.message, "VPC created");
    }

    #[test]
    fn test_unknown_resource_stops_report() {
        let (writer, tasks) = writer_with_task("task-1");
        writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Subnet, "subnet-1", &[]);

        let err = writer.update_reporting(
            "task-1",
            subnet_update("ghost", ReportStatus::Success, "ok"),
        );
        assert!(err.is_err());

        let task = tasks.get("task-1").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.message, INTERNAL_ERROR_MESSAGE);
        assert_eq!(task.report.status, ReportStatus::Failed);
    }

    #[test]
    fn test_stop_reporting_rewrites_unresolved_nodes() {
        let (writer, tasks) = writer_with_task("task-1");
        writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Subnet, "subnet-1", &[]);
        writer.ensure_resource("task-1", PROVISIONING, ResourceKind::Subnet, "subnet-2", &[]);
        writer
            .update_reporting(
                "task-1",
                subnet_update("subnet-1", ReportStatus::InProgress, ""),
            )
            .unwrap();

        writer.stop_reporting("task-1", INTERNAL_ERROR_MESSAGE);

        let report = tasks.get("task-1").unwrap().report;
        let type_node = report
            .stage(PROVISIONING)
            .unwrap()
            .type_node("Subnets")
            .unwrap();
        assert_eq!(
            type_node.resource("subnet-1").unwrap().status,
            ReportStatus::Failed
        );
        assert_eq!(
            type_node.resource("subnet-2").unwrap().status,
            ReportStatus::Cancelled
        );
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.message, INTERNAL_ERROR_MESSAGE);
    }
}
