//! Idempotent resource deletion: a provider 404 means the resource is
//! already gone and counts as success; the registry row is removed either
//! way.

use super::{account_for, checked, reporter};
use crate::logging::log_resource_operation;
use crate::orchestration::reporting::ReportUpdate;
use crate::orchestration::types::{ProvisionError, StepContext, StepHandler, StepOutput};
use crate::state_machine::{ReportStatus, ResourceStatus};
use async_trait::async_trait;

pub struct DeleteResourceHandler;

#[async_trait]
impl StepHandler for DeleteResourceHandler {
    fn name(&self) -> &'static str {
        "delete_resource"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        let record = ctx.resource_from_metadata().ok_or_else(|| {
            ProvisionError::TaskFailure("step metadata carries no resource".to_string())
        })?;
        let account = account_for(ctx)?;
        let report = reporter(ctx);
        let kind = record.kind();
        let name = record.name().to_string();
        let key = record.key();

        checked(report.update_reporting(
            &ctx.task_id,
            ReportUpdate::new(
                &ctx.stage,
                kind,
                &name,
                ReportStatus::InProgress,
                format!("Deleting {}", kind.report_label()),
            ),
        ))?;
        ctx.registry.set_status(&key, ResourceStatus::Deleting);

        match ctx.gateway.delete_resource(&account, &record).await {
            Ok(()) => {}
            Err(error) if error.is_not_found() => {
                log_resource_operation(
                    "delete_already_gone",
                    &kind.to_string(),
                    Some(&name),
                    Some(record.cloud_id()),
                    "DELETED",
                    Some("provider reported 404"),
                );
            }
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
                return Err(error);
            }
        }

        ctx.registry.remove(&key);
        checked(report.update_reporting(
            &ctx.task_id,
            ReportUpdate::new(
                &ctx.stage,
                kind,
                &name,
                ReportStatus::Success,
                format!("{} deleted successfully", kind.report_label()),
            ),
        ))?;
        Ok(StepOutput::Done)
    }
}
