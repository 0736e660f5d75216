//! # Orchestration
//!
//! The engine core: step execution wrapper, failure classification, report
//! aggregation, task finalization, workflow composition and the coordinator
//! that drives DAG roots from dispatch to terminal status.

pub mod composition;
pub mod error_classifier;
pub mod handlers;
pub mod reporting;
pub mod step_executor;
pub mod task_finalizer;
pub mod types;
pub mod workflow_coordinator;

pub use composition::{
    compose_cluster_migration, compose_dedicated_host_provisioning, compose_delete_with_children,
    compose_vpc_provisioning, WorkflowBuilder,
};
pub use error_classifier::classify_failure;
pub use reporting::{ReportUpdate, ReportWriter};
pub use step_executor::StepExecutor;
pub use task_finalizer::TaskFinalizer;
pub use types::{
    Attempt, ProvisionError, StepContext, StepHandler, StepOutcome, StepOutput, StepRequest,
};
pub use workflow_coordinator::WorkflowCoordinator;
