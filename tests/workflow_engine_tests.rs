//! Engine-level behavior over the real coordinator and worker pool:
//! callback gating of the parent root, skip propagation past failed
//! predecessors, and chain ordering.

mod common;

use async_trait::async_trait;
use common::harness;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;
use vpcflow_core::models::resources::ResourceKind;
use vpcflow_core::models::{RootKind, StepKind, TaskAction, TaskRecord, WorkflowTask};
use vpcflow_core::orchestration::WorkflowBuilder;
use vpcflow_core::{
    NodeState, ProvisionError, RootStatus, StepContext, StepHandler, StepOutput,
};

struct AlwaysOk;

#[async_trait]
impl StepHandler for AlwaysOk {
    fn name(&self) -> &'static str {
        "always_ok"
    }

    async fn execute(&self, _ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        Ok(StepOutput::Done)
    }
}

struct AlwaysFails;

#[async_trait]
impl StepHandler for AlwaysFails {
    fn name(&self) -> &'static str {
        "always_fails"
    }

    async fn execute(&self, _ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        Err(ProvisionError::Connect("provider unreachable".to_string()))
    }
}

/// Blocks until released, letting a test observe intermediate root states
struct Gated {
    release: Arc<Notify>,
}

#[async_trait]
impl StepHandler for Gated {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn execute(&self, _ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        self.release.notified().await;
        Ok(StepOutput::Done)
    }
}

fn seed_bare_task(h: &common::Harness, task_id: &str) {
    h.tasks.insert(TaskRecord::new(
        task_id,
        ResourceKind::Vpc,
        TaskAction::Add,
        common::CLOUD_ID,
    ));
}

async fn wait_for_root(h: &common::Harness, root_id: Uuid, wanted: RootStatus) -> RootStatus {
    for _ in 0..1_000 {
        let status = h.workflows.root(root_id).unwrap().status;
        if status == wanted {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    h.workflows.root(root_id).unwrap().status
}

#[tokio::test]
async fn test_holding_callback_gates_parent_completion() {
    let h = harness();
    seed_bare_task(&h, "task-cb");
    let release = Arc::new(Notify::new());
    h.handlers
        .register(ResourceKind::Vpc, StepKind::Validate, Arc::new(AlwaysOk));
    h.handlers.register(
        ResourceKind::ResourceGroup,
        StepKind::Validate,
        Arc::new(Gated {
            release: Arc::clone(&release),
        }),
    );

    let (mut parent, parent_nodes) = WorkflowBuilder::new(RootKind::Normal, "task-cb")
        .chain(WorkflowTask::new(StepKind::Validate, ResourceKind::Vpc, "p"))
        .unwrap()
        .build()
        .unwrap();
    let (mut callback, callback_nodes) = WorkflowBuilder::new(RootKind::OnSuccess, "task-cb")
        .chain(WorkflowTask::new(
            StepKind::Validate,
            ResourceKind::ResourceGroup,
            "gate",
        ))
        .unwrap()
        .build()
        .unwrap();
    parent.add_callback_root(&mut callback, true).unwrap();

    let parent_id = parent.id;
    let callback_id = callback.id;
    for node in parent_nodes.into_iter().chain(callback_nodes) {
        h.workflows.insert_node(node);
    }
    h.workflows.insert_root(parent);
    h.workflows.insert_root(callback);

    h.coordinator.start_root(parent_id).await.unwrap();

    // Parent's own tasks settle, but the held callback keeps it in Wfc
    let status = wait_for_root(&h, parent_id, RootStatus::CompletedSuccessfullyWfc).await;
    assert_eq!(status, RootStatus::CompletedSuccessfullyWfc);

    // The snapshot handed to the callback records the status the parent
    // was triggered on, not the Running row it settled from
    let mut copy = None;
    for _ in 0..1_000 {
        copy = h.workflows.root(callback_id).unwrap().parent_root_copy;
        if copy.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let copy = copy.expect("callback never received the parent snapshot");
    assert_eq!(copy["status"], "COMPLETED_SUCCESSFULLY_WFC");
    assert_eq!(copy["task_id"], "task-cb");

    release.notify_one();

    let status = wait_for_root(&h, parent_id, RootStatus::CompletedSuccessfully).await;
    assert_eq!(status, RootStatus::CompletedSuccessfully);
    assert_eq!(
        h.workflows.root(callback_id).unwrap().status,
        RootStatus::CompletedSuccessfully
    );
}

#[tokio::test]
async fn test_on_failure_callback_skipped_when_parent_succeeds() {
    let h = harness();
    seed_bare_task(&h, "task-nf");
    h.handlers
        .register(ResourceKind::Vpc, StepKind::Validate, Arc::new(AlwaysOk));

    let (mut parent, parent_nodes) = WorkflowBuilder::new(RootKind::Normal, "task-nf")
        .chain(WorkflowTask::new(StepKind::Validate, ResourceKind::Vpc, "p"))
        .unwrap()
        .build()
        .unwrap();
    let (mut callback, callback_nodes) = WorkflowBuilder::new(RootKind::OnFailure, "task-nf")
        .chain(WorkflowTask::new(StepKind::Validate, ResourceKind::Vpc, "cleanup"))
        .unwrap()
        .build()
        .unwrap();
    parent.add_callback_root(&mut callback, true).unwrap();

    let parent_id = parent.id;
    let callback_id = callback.id;
    for node in parent_nodes.into_iter().chain(callback_nodes) {
        h.workflows.insert_node(node);
    }
    h.workflows.insert_root(parent);
    h.workflows.insert_root(callback);

    h.coordinator.start_root(parent_id).await.unwrap();

    let status = wait_for_root(&h, parent_id, RootStatus::CompletedSuccessfully).await;
    assert_eq!(status, RootStatus::CompletedSuccessfully);
    // The non-matching callback was never triggered
    assert_eq!(
        h.workflows.root(callback_id).unwrap().status,
        RootStatus::OnHold
    );
}

#[tokio::test]
async fn test_failure_skips_successors_but_runs_failure_observers() {
    let h = harness();
    seed_bare_task(&h, "task-skip");
    h.handlers
        .register(ResourceKind::Vpc, StepKind::Validate, Arc::new(AlwaysFails));
    h.handlers
        .register(ResourceKind::Subnet, StepKind::Validate, Arc::new(AlwaysOk));
    h.handlers.register(
        ResourceKind::NetworkAcl,
        StepKind::Validate,
        Arc::new(AlwaysOk),
    );

    let (root, nodes) = WorkflowBuilder::new(RootKind::Normal, "task-skip")
        .chain(WorkflowTask::new(StepKind::Validate, ResourceKind::Vpc, "a"))
        .unwrap()
        .chain(WorkflowTask::new(StepKind::Validate, ResourceKind::Subnet, "b"))
        .unwrap()
        .chain(
            WorkflowTask::new(StepKind::Validate, ResourceKind::NetworkAcl, "observer")
                .run_on_failure(),
        )
        .unwrap()
        .build()
        .unwrap();
    let root_id = root.id;
    let node_ids: Vec<Uuid> = nodes.iter().map(|n| n.id).collect();
    for node in nodes {
        h.workflows.insert_node(node);
    }
    h.workflows.insert_root(root);

    h.coordinator.start_root(root_id).await.unwrap();

    let status = wait_for_root(&h, root_id, RootStatus::CompletedWithFailure).await;
    assert_eq!(status, RootStatus::CompletedWithFailure);

    let a = h.workflows.node(node_ids[0]).unwrap();
    let b = h.workflows.node(node_ids[1]).unwrap();
    let observer = h.workflows.node(node_ids[2]).unwrap();
    assert_eq!(a.status, NodeState::Failed);
    assert_eq!(b.status, NodeState::Failed);
    assert_eq!(b.message, "Skipped: predecessor failed");
    assert_eq!(observer.status, NodeState::Successful);
}

#[tokio::test]
async fn test_chain_runs_in_declared_order() {
    let h = harness();
    seed_bare_task(&h, "task-order");

    struct Records {
        order: parking_lot::Mutex<Vec<String>>,
    }

    struct Recording {
        records: Arc<Records>,
    }

    #[async_trait]
    impl StepHandler for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
            self.records.order.lock().push(ctx.node.resource_name.clone());
            Ok(StepOutput::Done)
        }
    }

    let records = Arc::new(Records {
        order: parking_lot::Mutex::new(Vec::new()),
    });
    h.handlers.register(
        ResourceKind::Vpc,
        StepKind::Validate,
        Arc::new(Recording {
            records: Arc::clone(&records),
        }),
    );

    let (root, nodes) = WorkflowBuilder::new(RootKind::Normal, "task-order")
        .chain(WorkflowTask::new(StepKind::Validate, ResourceKind::Vpc, "first"))
        .unwrap()
        .chain(WorkflowTask::new(StepKind::Validate, ResourceKind::Vpc, "second"))
        .unwrap()
        .chain(WorkflowTask::new(StepKind::Validate, ResourceKind::Vpc, "third"))
        .unwrap()
        .build()
        .unwrap();
    let root_id = root.id;
    for node in nodes {
        h.workflows.insert_node(node);
    }
    h.workflows.insert_root(root);

    h.coordinator.start_root(root_id).await.unwrap();

    let status = wait_for_root(&h, root_id, RootStatus::CompletedSuccessfully).await;
    assert_eq!(status, RootStatus::CompletedSuccessfully);
    assert_eq!(*records.order.lock(), vec!["first", "second", "third"]);
}
