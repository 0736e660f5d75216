//! # Step Handlers
//!
//! The domain logic behind each `(resource kind, step kind)` pair. Handlers
//! are stateless; everything arrives through the `StepContext`. The default
//! wiring covers the canonical templates: resource creation with polling,
//! idempotent deletion, the cluster migration chain, chord convergence and
//! task finalization.

pub mod cluster;
pub mod control;
pub mod create;
pub mod delete;

pub use cluster::{ClusterBackupHandler, ClusterRestoreHandler};
pub use control::{ChordFinisherHandler, FinalizeTaskHandler};
pub use create::CreateResourceHandler;
pub use delete::DeleteResourceHandler;

use crate::error::Result as CoreResult;
use crate::models::resources::ResourceKind;
use crate::models::{CloudAccount, StepKind};
use crate::orchestration::reporting::ReportWriter;
use crate::orchestration::types::{ProvisionError, StepContext};
use crate::registry::HandlerRegistry;
use std::sync::Arc;

const ALL_KINDS: &[ResourceKind] = &[
    ResourceKind::Vpc,
    ResourceKind::Subnet,
    ResourceKind::SecurityGroup,
    ResourceKind::NetworkAcl,
    ResourceKind::LoadBalancer,
    ResourceKind::VpnGateway,
    ResourceKind::VpnConnection,
    ResourceKind::DedicatedHost,
    ResourceKind::KubernetesCluster,
    ResourceKind::ResourceGroup,
];

/// Wire the default handler set used by the canonical templates
pub fn register_default_handlers(handlers: &HandlerRegistry) {
    let create = Arc::new(CreateResourceHandler);
    let delete = Arc::new(DeleteResourceHandler);
    let converge = Arc::new(ChordFinisherHandler);
    let finalize = Arc::new(FinalizeTaskHandler);

    for kind in ALL_KINDS {
        handlers.register(*kind, StepKind::Create, create.clone());
        handlers.register(*kind, StepKind::Delete, delete.clone());
        handlers.register(*kind, StepKind::Converge, converge.clone());
        handlers.register(*kind, StepKind::Finalize, finalize.clone());
    }
    handlers.register(
        ResourceKind::KubernetesCluster,
        StepKind::Backup,
        Arc::new(ClusterBackupHandler),
    );
    handlers.register(
        ResourceKind::KubernetesCluster,
        StepKind::Restore,
        Arc::new(ClusterRestoreHandler),
    );
}

/// Resolve the cloud account the step runs under
pub(crate) fn account_for(ctx: &StepContext) -> Result<CloudAccount, ProvisionError> {
    let account_id = ctx.account_id().ok_or_else(|| {
        ProvisionError::TaskFailure("step metadata carries no account id".to_string())
    })?;
    ctx.registry.account(account_id).ok_or_else(|| {
        ProvisionError::WorkflowTerminated(format!("cloud account {account_id} not found"))
    })
}

pub(crate) fn reporter(ctx: &StepContext) -> ReportWriter {
    ReportWriter::new(Arc::clone(&ctx.tasks))
}

/// A report write that fails is an internal failure of this step
pub(crate) fn checked<T>(result: CoreResult<T>) -> Result<T, ProvisionError> {
    result.map_err(|err| ProvisionError::TaskFailure(err.to_string()))
}
