//! Resource creation with bounded stabilization polling.
//!
//! The registry row stays `Creating` after the provider accepts the call;
//! promotion to `Created` happens at task finalization, so a later sibling
//! failure can still move the primary resource to `ErrorCreating`.

use super::{account_for, checked, reporter};
use crate::orchestration::reporting::ReportUpdate;
use crate::orchestration::types::{ProvisionError, StepContext, StepHandler, StepOutput};
use crate::state_machine::{ReportStatus, ResourceStatus};
use async_trait::async_trait;

pub struct CreateResourceHandler;

#[async_trait]
impl StepHandler for CreateResourceHandler {
    fn name(&self) -> &'static str {
        "create_resource"
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
                format!("Creating {}", kind.report_label()),
            ),
        ))?;

        let stored = ctx.registry.add_update(record);
        let key = stored.key();
        ctx.registry.set_status(&key, ResourceStatus::Creating);

        match ctx.gateway.create_resource(&account, &stored).await {
            Ok(provider_resource) => {
                ctx.registry
                    .set_provider_id(&key, &provider_resource.provider_id);
                if provider_resource.status == ResourceStatus::Creating {
                    return Ok(StepOutput::Waiting);
                }
                checked(report.update_reporting(
                    &ctx.task_id,
                    ReportUpdate::new(
                        &ctx.stage,
                        kind,
                        &name,
                        ReportStatus::Success,
                        format!("{} created successfully", kind.report_label()),
                    ),
                ))?;
                Ok(StepOutput::Done)
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
                Err(error)
            }
        }
    }

    async fn poll(&self, ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        let record = ctx.resource_from_metadata().ok_or_else(|| {
            ProvisionError::TaskFailure("step metadata carries no resource".to_string())
        })?;
        let account = account_for(ctx)?;
        let kind = record.kind();
        let name = record.name().to_string();
        let key = record.key();

        match ctx.gateway.fetch_resource(&account, &key).await {
            Ok(Some(provider_resource)) => {
                if provider_resource.status == ResourceStatus::Creating {
                    return Ok(StepOutput::Waiting);
                }
                checked(reporter(ctx).update_reporting(
                    &ctx.task_id,
                    ReportUpdate::new(
                        &ctx.stage,
                        kind,
                        &name,
                        ReportStatus::Success,
                        format!("{} created successfully", kind.report_label()),
                    ),
                ))?;
                Ok(StepOutput::Done)
            }
            Ok(None) => Err(ProvisionError::TaskFailure(format!(
                "{name} disappeared while stabilizing"
            ))),
            Err(error) => {
                let _ = reporter(ctx).update_reporting(
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
