//! Cluster migration steps: workloads backup and restore. The provision
//! step in the middle of the migration chain is the generic create handler.
//!
//! A backup failure is fatal for the whole migration: nothing downstream
//! can run without the artifact, so the handler raises a termination signal
//! instead of an ordinary step failure.

use super::{account_for, checked, reporter};
use crate::constants::stages;
use crate::orchestration::reporting::ReportUpdate;
use crate::orchestration::types::{ProvisionError, StepContext, StepHandler, StepOutput};
use crate::state_machine::ReportStatus;
use async_trait::async_trait;

pub struct ClusterBackupHandler;

#[async_trait]
impl StepHandler for ClusterBackupHandler {
    fn name(&self) -> &'static str {
        "cluster_backup"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        let record = ctx.resource_from_metadata().ok_or_else(|| {
            ProvisionError::TaskFailure("step metadata carries no resource".to_string())
        })?;
        let account = account_for(ctx)?;
        let report = reporter(ctx);
        let kind = record.kind();
        let name = record.name().to_string();

        checked(report.update_reporting(
            &ctx.task_id,
            ReportUpdate::new(
                &ctx.stage,
                kind,
                &name,
                ReportStatus::InProgress,
                "Backing up workloads",
            ),
        ))?;

        // The source cluster must be reachable before a backup can start
        match ctx.gateway.fetch_resource(&account, &record.key()).await {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                // Termination carries the user-facing message verbatim; the
                // report entry is left as the truncation found it
                return Err(ProvisionError::WorkflowTerminated(format!(
                    "{}, Backup Creation Failed",
                    stages::WORKLOADS_BACKUP
                )));
            }
        }

        checked(report.update_reporting(
            &ctx.task_id,
            ReportUpdate::new(
                &ctx.stage,
                kind,
                &name,
                ReportStatus::Success,
                "Workloads backup created",
            ),
        ))?;
        Ok(StepOutput::Done)
    }
}

pub struct ClusterRestoreHandler;

#[async_trait]
impl StepHandler for ClusterRestoreHandler {
    fn name(&self) -> &'static str {
        "cluster_restore"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        let record = ctx.resource_from_metadata().ok_or_else(|| {
            ProvisionError::TaskFailure("step metadata carries no resource".to_string())
        })?;
        let account = account_for(ctx)?;
        let report = reporter(ctx);
        let kind = record.kind();
        let name = record.name().to_string();

        checked(report.update_reporting(
            &ctx.task_id,
            ReportUpdate::new(
                &ctx.stage,
                kind,
                &name,
                ReportStatus::InProgress,
                "Restoring workloads",
            ),
        ))?;

        // The restore target is the cluster the provision step created
        match ctx.gateway.fetch_resource(&account, &record.key()).await {
            Ok(Some(_)) => {
                checked(report.update_reporting(
                    &ctx.task_id,
                    ReportUpdate::new(
                        &ctx.stage,
                        kind,
                        &name,
                        ReportStatus::Success,
                        "Workloads restored",
                    ),
                ))?;
                Ok(StepOutput::Done)
            }
            Ok(None) => Err(ProvisionError::TaskFailure(format!(
                "restore target {name} does not exist"
            ))),
            Err(error) => {
                let _ = report.update_reporting(
                    &ctx.task_id,
                    ReportUpdate::new(
                        &ctx.stage,
                        kind,
                        &name,
                        ReportStatus::Failed,
                        error.user_message(),
                    ),
                );
                Err(error)
            }
        }
    }
}
