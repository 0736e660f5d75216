#![allow(clippy::doc_markdown)] // Allow technical terms like VPC, SubTask in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # VPCFlow Core
//!
//! Asynchronous orchestration core for multi-cloud VPC provisioning and
//! migration workflows.
//!
//! ## Overview
//!
//! VPCFlow Core drives long-running, partially-failing infrastructure
//! operations — creating a VPC with its subnets, tearing down a VPN gateway
//! and its connections, migrating a Kubernetes cluster — as DAGs of
//! independently schedulable steps executed by a worker pool. All
//! coordination state lives in the stores; workers share nothing else.
//!
//! ## Architecture
//!
//! - Every business operation is a **task** with a durable record and a
//!   hierarchical progress report shaped for progressive disclosure.
//! - The operation's steps form a **workflow root**: a DAG of nodes with
//!   chain/group/chord composition and optional callback sub-trees
//!   triggered by the root's outcome.
//! - Each step runs through the **step executor**, the single place the
//!   provisioning error taxonomy is caught and classified.
//! - The **task finalizer** drains the task's ephemeral SubTasks to decide
//!   the terminal status: FAILED iff any unit of work failed.
//! - Resource state reconciles into the **resource registry** through an
//!   idempotent upsert (`make_copy` / `params_eq` / `add_update`).
//!
//! ## Module Organization
//!
//! - [`models`] - Task records, reports, workflow roots/nodes, resources
//! - [`state_machine`] - Root, node, report and resource status lifecycles
//! - [`store`] - The durable coordination-state seam
//! - [`registry`] - Resource catalog and step handler resolution
//! - [`services`] - The cloud gateway trait and the scriptable mock
//! - [`orchestration`] - Executor, reporting, composition, coordinator
//! - [`messaging`] - Bounded step queue and worker pool
//! - [`config`] - Named per-operation retry/poll policies
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vpcflow_core::config::OrchestratorConfig;
//! use vpcflow_core::messaging::{StepQueue, WorkerPool};
//! use vpcflow_core::orchestration::handlers::register_default_handlers;
//! use vpcflow_core::orchestration::WorkflowCoordinator;
//! use vpcflow_core::registry::{HandlerRegistry, ResourceRegistry};
//! use vpcflow_core::services::MockGateway;
//! use vpcflow_core::store::{SubTaskStore, TaskStore, WorkflowStore};
//!
//! # async fn example() {
//! let config = Arc::new(OrchestratorConfig::default());
//! let handlers = Arc::new(HandlerRegistry::new());
//! register_default_handlers(&handlers);
//!
//! let (queue, receiver) = StepQueue::bounded(config.queue_capacity);
//! let coordinator = Arc::new(WorkflowCoordinator::new(
//!     Arc::new(TaskStore::new()),
//!     Arc::new(SubTaskStore::new()),
//!     Arc::new(WorkflowStore::new()),
//!     Arc::new(ResourceRegistry::new()),
//!     handlers,
//!     Arc::new(MockGateway::new()),
//!     Arc::clone(&config),
//!     queue,
//! ));
//! let pool = WorkerPool::spawn(Arc::clone(&coordinator), receiver, config.worker_count);
//! # let _ = pool;
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod services;
pub mod state_machine;
pub mod store;

pub use config::{OperationKind, OrchestratorConfig, RetryPolicy};
pub use error::{CoreError, Result};
pub use logging::init_structured_logging;
pub use models::{
    Report, ResourceKey, ResourceRecord, RootKind, StepKind, SubTask, TaskAction, TaskRecord,
    WorkflowRoot, WorkflowTask,
};
pub use orchestration::{
    ProvisionError, StepContext, StepHandler, StepOutcome, StepOutput, StepRequest,
    WorkflowCoordinator,
};
pub use registry::{HandlerRegistry, ResourceRegistry};
pub use services::{CloudGateway, MockGateway, ProviderResource};
pub use state_machine::{
    AccountStatus, NodeState, ReportStatus, ResourceStatus, RootStatus, SubTaskStatus, TaskStatus,
};
pub use store::{SubTaskStore, TaskStore, WorkflowStore};
