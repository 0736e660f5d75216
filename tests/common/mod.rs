//! Shared end-to-end harness: full coordinator stack over the mock gateway
//! with fast polling policies.

use std::sync::Arc;
use std::time::Duration;
use vpcflow_core::config::{OrchestratorConfig, RetryPolicy};
use vpcflow_core::messaging::{StepQueue, WorkerPool};
use vpcflow_core::models::resources::ResourceKind;
use vpcflow_core::models::{CloudAccount, CloudProvider, TaskAction, TaskRecord};
use vpcflow_core::orchestration::handlers::register_default_handlers;
use vpcflow_core::orchestration::WorkflowCoordinator;
use vpcflow_core::registry::{HandlerRegistry, ResourceRegistry};
use vpcflow_core::services::MockGateway;
use vpcflow_core::store::{SubTaskStore, TaskStore, WorkflowStore};

pub const ACCOUNT_ID: &str = "acct-test";
pub const CLOUD_ID: &str = "cloud-test";

pub struct Harness {
    pub coordinator: Arc<WorkflowCoordinator>,
    pub tasks: Arc<TaskStore>,
    pub sub_tasks: Arc<SubTaskStore>,
    pub workflows: Arc<WorkflowStore>,
    pub registry: Arc<ResourceRegistry>,
    pub gateway: Arc<MockGateway>,
    pub handlers: Arc<HandlerRegistry>,
    _pool: WorkerPool,
}

pub fn fast_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.worker_count = 4;
    config.finalizer_poll_ms = 1;
    config.finalizer_max_passes = 200;
    let fast = RetryPolicy::new(10, 10);
    config.policies.vpc_provision = fast;
    config.policies.subnet_provision = fast;
    config.policies.dedicated_host_provision = fast;
    config.policies.resource_deletion = fast;
    config.policies.cluster_backup = fast;
    config.policies.cluster_provision = fast;
    config.policies.cluster_restore = fast;
    config
}

pub fn harness() -> Harness {
    let config = Arc::new(fast_config());
    let tasks = Arc::new(TaskStore::new());
    let sub_tasks = Arc::new(SubTaskStore::new());
    let workflows = Arc::new(WorkflowStore::new());
    let registry = Arc::new(ResourceRegistry::new());
    let gateway = Arc::new(MockGateway::new());
    let handlers = Arc::new(HandlerRegistry::new());
    register_default_handlers(&handlers);

    registry.upsert_account(CloudAccount::new(ACCOUNT_ID, "test", CloudProvider::Ibm));

    let (queue, receiver) = StepQueue::bounded(config.queue_capacity);
    let coordinator = Arc::new(WorkflowCoordinator::new(
        Arc::clone(&tasks),
        Arc::clone(&sub_tasks),
        Arc::clone(&workflows),
        Arc::clone(&registry),
        Arc::clone(&handlers),
        Arc::clone(&gateway) as _,
        Arc::clone(&config),
        queue,
    ));
    let pool = WorkerPool::spawn(Arc::clone(&coordinator), receiver, config.worker_count);

    Harness {
        coordinator,
        tasks,
        sub_tasks,
        workflows,
        registry,
        gateway,
        handlers,
        _pool: pool,
    }
}

impl Harness {
    pub fn seed_task(&self, task_id: &str, kind: ResourceKind, action: TaskAction, name: &str) {
        self.tasks.insert(
            TaskRecord::new(task_id, kind, action, CLOUD_ID)
                .with_region("us-south")
                .with_resource_name(name),
        );
    }

    /// Poll until the task settles; panics if it never does
    pub async fn wait_for_terminal(&self, task_id: &str) -> TaskRecord {
        for _ in 0..1_000 {
            if let Some(task) = self.tasks.get(task_id) {
                if task.status.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {task_id} did not reach a terminal status");
    }
}
