//! # Workflow Composition
//!
//! Assembles the ordered/parallel step structure of a business operation as
//! a node arena inside a workflow root. Three sequencing primitives:
//!
//! - `chain` — strict sequence, each step's completion triggers the next
//! - `group` — parallel fan-out of independent steps
//! - `chord` — group plus one finisher that runs only after every member
//!   has settled, used to decide the fan-out's overall outcome
//!
//! The canonical templates live here too: the delete-children-then-parent
//! shape, VPC provisioning, and the cluster migration chain. Templates
//! pre-populate the task's report skeleton so the UI sees pending entries
//! before any step runs.

use crate::config::OperationKind;
use crate::constants::stages;
use crate::constants::system::MAX_WORKFLOW_NODES;
use crate::error::{CoreError, Result};
use crate::models::resources::ResourceKind;
use crate::models::{
    DedicatedHost, KubernetesCluster, ResourceRecord, RootKind, StepKind, Vpc, WorkflowRoot,
    WorkflowTask,
};
use crate::orchestration::reporting::ReportWriter;
use crate::store::WorkflowStore;
use serde_json::{json, Value};
use uuid::Uuid;

pub struct WorkflowBuilder {
    root: WorkflowRoot,
    nodes: Vec<WorkflowTask>,
    /// Frontier the next chained element attaches to
    tails: Vec<usize>,
}

impl WorkflowBuilder {
    pub fn new(root_kind: RootKind, task_id: impl Into<String>) -> Self {
        Self {
            root: WorkflowRoot::new(root_kind, task_id),
            nodes: Vec::new(),
            tails: Vec::new(),
        }
    }

    pub fn root_id(&self) -> Uuid {
        self.root.id
    }

    fn adopt(&mut self, mut node: WorkflowTask) -> usize {
        node.root_id = self.root.id;
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn link(&mut self, from: usize, to: usize) -> Result<()> {
        // Nodes are appended in composition order, so `from` precedes `to`
        let (head, tail) = self.nodes.split_at_mut(to);
        head[from].add_next_task(&mut tail[0])
    }

    /// Append one step after the current frontier
    pub fn chain(mut self, node: WorkflowTask) -> Result<Self> {
        let index = self.adopt(node);
        for tail in self.tails.clone() {
            self.link(tail, index)?;
        }
        self.tails = vec![index];
        Ok(self)
    }

    /// Append a parallel fan-out after the current frontier. Every member
    /// becomes part of the new frontier.
    pub fn group(mut self, members: Vec<WorkflowTask>) -> Result<Self> {
        if members.is_empty() {
            return Err(CoreError::CompositionError(
                "a group needs at least one member".to_string(),
            ));
        }
        let tails = self.tails.clone();
        let mut new_tails = Vec::with_capacity(members.len());
        for member in members {
            let index = self.adopt(member);
            for tail in &tails {
                self.link(*tail, index)?;
            }
            new_tails.push(index);
        }
        self.tails = new_tails;
        Ok(self)
    }

    /// Fan-out plus a finisher that observes every member's terminal
    /// status, including failures
    pub fn chord(self, members: Vec<WorkflowTask>, finisher: WorkflowTask) -> Result<Self> {
        self.group(members)?.chain(finisher.run_on_failure())
    }

    /// Finish composition: every node joins the root's arena
    pub fn build(mut self) -> Result<(WorkflowRoot, Vec<WorkflowTask>)> {
        if self.nodes.is_empty() {
            return Err(CoreError::CompositionError(
                "a workflow needs at least one node".to_string(),
            ));
        }
        if self.nodes.len() > MAX_WORKFLOW_NODES {
            return Err(CoreError::CompositionError(format!(
                "workflow has {} nodes, limit is {MAX_WORKFLOW_NODES}",
                self.nodes.len()
            )));
        }
        self.root.associated_task_ids = self.nodes.iter().map(|n| n.id).collect();
        Ok((self.root, self.nodes))
    }

    /// Build and persist into the workflow store
    pub fn build_into(self, store: &WorkflowStore) -> Result<WorkflowRoot> {
        let (root, nodes) = self.build()?;
        for node in nodes {
            store.insert_node(node);
        }
        store.insert_root(root.clone());
        Ok(root)
    }
}

fn step_metadata(stage: &str, account_id: &str, resource: Option<&ResourceRecord>) -> Value {
    let mut metadata = json!({
        "stage": stage,
        "account_id": account_id,
    });
    if let Some(resource) = resource {
        metadata["resource"] = serde_json::to_value(resource).unwrap_or(Value::Null);
    }
    metadata
}

fn finalize_node(resource_kind: ResourceKind, name: &str, stage: &str, account_id: &str) -> WorkflowTask {
    WorkflowTask::new(StepKind::Finalize, resource_kind, name)
        .with_metadata(step_metadata(stage, account_id, None))
        .with_operation(OperationKind::FinalizerDrain)
        .run_on_failure()
}

/// Create VPC → fan out subnet creations → finalize, with the report
/// skeleton pre-populated.
pub fn compose_vpc_provisioning(
    task_id: &str,
    account_id: &str,
    vpc: &Vpc,
    report: &ReportWriter,
) -> Result<(WorkflowRoot, Vec<WorkflowTask>)> {
    let stage = stages::PROVISIONING;
    report.ensure_resource(task_id, stage, ResourceKind::Vpc, &vpc.name, &[]);
    for subnet in &vpc.subnets {
        report.ensure_resource(task_id, stage, ResourceKind::Subnet, &subnet.name, &[]);
    }

    let vpc_record = ResourceRecord::Vpc(vpc.clone());
    let vpc_node = WorkflowTask::new(StepKind::Create, ResourceKind::Vpc, &vpc.name)
        .with_metadata(step_metadata(stage, account_id, Some(&vpc_record)))
        .with_operation(OperationKind::VpcProvision);

    let subnet_nodes: Vec<WorkflowTask> = vpc
        .subnets
        .iter()
        .map(|subnet| {
            let record = ResourceRecord::Subnet(subnet.clone());
            WorkflowTask::new(StepKind::Create, ResourceKind::Subnet, &subnet.name)
                .with_metadata(step_metadata(stage, account_id, Some(&record)))
                .with_operation(OperationKind::SubnetProvision)
        })
        .collect();

    let mut builder = WorkflowBuilder::new(RootKind::Normal, task_id).chain(vpc_node)?;
    if !subnet_nodes.is_empty() {
        builder = builder.group(subnet_nodes)?;
    }
    builder
        .chain(finalize_node(ResourceKind::Vpc, &vpc.name, stage, account_id))?
        .build()
}

/// Single slow-stabilizing create, then finalize. Dedicated hosts carry
/// their own polling policy because provider-side placement takes minutes.
pub fn compose_dedicated_host_provisioning(
    task_id: &str,
    account_id: &str,
    host: &DedicatedHost,
    report: &ReportWriter,
) -> Result<(WorkflowRoot, Vec<WorkflowTask>)> {
    let stage = stages::PROVISIONING;
    report.ensure_resource(task_id, stage, ResourceKind::DedicatedHost, &host.name, &[]);

    let record = ResourceRecord::DedicatedHost(host.clone());
    let host_node = WorkflowTask::new(StepKind::Create, ResourceKind::DedicatedHost, &host.name)
        .with_metadata(step_metadata(stage, account_id, Some(&record)))
        .with_operation(OperationKind::DedicatedHostProvision);

    WorkflowBuilder::new(RootKind::Normal, task_id)
        .chain(host_node)?
        .chain(finalize_node(
            ResourceKind::DedicatedHost,
            &host.name,
            stage,
            account_id,
        ))?
        .build()
}

/// Delete dependent children in parallel, converge on their outcome, then
/// delete the parent, then finalize. The standard shape for every resource
/// with children.
pub fn compose_delete_with_children(
    task_id: &str,
    account_id: &str,
    parent: &ResourceRecord,
    children: &[ResourceRecord],
    report: &ReportWriter,
) -> Result<(WorkflowRoot, Vec<WorkflowTask>)> {
    let stage = stages::DELETION;
    report.ensure_resource(task_id, stage, parent.kind(), parent.name(), &[]);
    for child in children {
        report.ensure_resource(task_id, stage, child.kind(), child.name(), &[]);
    }

    let child_nodes: Vec<WorkflowTask> = children
        .iter()
        .map(|child| {
            WorkflowTask::new(StepKind::Delete, child.kind(), child.name())
                .with_metadata(step_metadata(stage, account_id, Some(child)))
                .with_operation(OperationKind::ResourceDeletion)
        })
        .collect();

    let finisher = WorkflowTask::new(StepKind::Converge, parent.kind(), parent.name())
        .with_metadata(step_metadata(stage, account_id, None));

    let parent_delete = WorkflowTask::new(StepKind::Delete, parent.kind(), parent.name())
        .with_metadata(step_metadata(stage, account_id, Some(parent)))
        .with_operation(OperationKind::ResourceDeletion);

    let builder = WorkflowBuilder::new(RootKind::Normal, task_id);
    let builder = if child_nodes.is_empty() {
        builder.chain(parent_delete)?
    } else {
        builder
            .chord(child_nodes, finisher)?
            .chain(parent_delete)?
    };
    builder
        .chain(finalize_node(parent.kind(), parent.name(), stage, account_id))?
        .build()
}

/// Strict backup → provision → restore chain; no parallelism because each
/// stage depends on the previous stage's external side effect.
pub fn compose_cluster_migration(
    task_id: &str,
    account_id: &str,
    cluster: &KubernetesCluster,
    report: &ReportWriter,
) -> Result<(WorkflowRoot, Vec<WorkflowTask>)> {
    let record = ResourceRecord::KubernetesCluster(cluster.clone());
    for stage in [
        stages::WORKLOADS_BACKUP,
        stages::CLUSTER_PROVISIONING,
        stages::WORKLOADS_RESTORE,
    ] {
        report.ensure_resource(task_id, stage, ResourceKind::KubernetesCluster, &cluster.name, &[]);
    }

    let backup = WorkflowTask::new(StepKind::Backup, ResourceKind::KubernetesCluster, &cluster.name)
        .with_metadata(step_metadata(stages::WORKLOADS_BACKUP, account_id, Some(&record)))
        .with_operation(OperationKind::ClusterBackup);
    let provision =
        WorkflowTask::new(StepKind::Create, ResourceKind::KubernetesCluster, &cluster.name)
            .with_metadata(step_metadata(
                stages::CLUSTER_PROVISIONING,
                account_id,
                Some(&record),
            ))
            .with_operation(OperationKind::ClusterProvision);
    let restore =
        WorkflowTask::new(StepKind::Restore, ResourceKind::KubernetesCluster, &cluster.name)
            .with_metadata(step_metadata(
                stages::WORKLOADS_RESTORE,
                account_id,
                Some(&record),
            ))
            .with_operation(OperationKind::ClusterRestore);

    WorkflowBuilder::new(RootKind::Normal, task_id)
        .chain(backup)?
        .chain(provision)?
        .chain(restore)?
        .chain(finalize_node(
            ResourceKind::KubernetesCluster,
            &cluster.name,
            stages::WORKLOADS_RESTORE,
            account_id,
        ))?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Subnet, TaskAction, TaskRecord};
    use crate::store::TaskStore;
    use std::sync::Arc;

    fn report_writer(task_id: &str) -> ReportWriter {
        let tasks = Arc::new(TaskStore::new());
        tasks.insert(TaskRecord::new(
            task_id,
            ResourceKind::Vpc,
            TaskAction::Add,
            "cloud-1",
        ));
        ReportWriter::new(tasks)
    }

    fn step(kind: StepKind, name: &str) -> WorkflowTask {
        WorkflowTask::new(kind, ResourceKind::Subnet, name)
    }

    #[test]
    fn test_chain_is_strictly_sequential() {
        let (_root, nodes) = WorkflowBuilder::new(RootKind::Normal, "task-1")
            .chain(step(StepKind::Create, "a"))
            .unwrap()
            .chain(step(StepKind::Create, "b"))
            .unwrap()
            .chain(step(StepKind::Create, "c"))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(nodes[0].next_ids, vec![nodes[1].id]);
        assert_eq!(nodes[1].next_ids, vec![nodes[2].id]);
        assert!(nodes[0].is_entry());
        assert!(!nodes[2].is_entry());
    }

    #[test]
    fn test_group_fans_out_and_rejoins() {
        let (_root, nodes) = WorkflowBuilder::new(RootKind::Normal, "task-1")
            .chain(step(StepKind::Create, "head"))
            .unwrap()
            .group(vec![
                step(StepKind::Create, "m1"),
                step(StepKind::Create, "m2"),
            ])
            .unwrap()
            .chain(step(StepKind::Finalize, "tail"))
            .unwrap()
            .build()
            .unwrap();

        let head = &nodes[0];
        let tail = &nodes[3];
        assert_eq!(head.next_ids.len(), 2);
        assert_eq!(tail.previous_ids.len(), 2);
    }

    #[test]
    fn test_chord_finisher_runs_on_failure() {
        let (_root, nodes) = WorkflowBuilder::new(RootKind::Normal, "task-1")
            .chord(
                vec![step(StepKind::Delete, "m1"), step(StepKind::Delete, "m2")],
                step(StepKind::Converge, "finisher"),
            )
            .unwrap()
            .build()
            .unwrap();

        let finisher = nodes.last().unwrap();
        assert!(finisher.run_on_failure);
        assert_eq!(finisher.previous_ids.len(), 2);
    }

    #[test]
    fn test_empty_group_is_rejected() {
        let result = WorkflowBuilder::new(RootKind::Normal, "task-1").group(vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_vpc_template_shape() {
        let report = report_writer("task-1");
        let vpc = Vpc::new("cloud-1", "us-south", "test-vpc")
            .with_subnet(Subnet::new("cloud-1", "us-south", "subnet-1", "test-vpc", "10.0.1.0/24"))
            .with_subnet(Subnet::new("cloud-1", "us-south", "subnet-2", "test-vpc", "10.0.2.0/24"));

        let (root, nodes) =
            compose_vpc_provisioning("task-1", "acct-1", &vpc, &report).unwrap();

        // create vpc + 2 subnets + finalize
        assert_eq!(nodes.len(), 4);
        assert_eq!(root.associated_task_ids.len(), 4);
        assert_eq!(nodes[0].step_kind, StepKind::Create);
        assert_eq!(nodes[0].resource_kind, ResourceKind::Vpc);
        let finalize = nodes.last().unwrap();
        assert_eq!(finalize.step_kind, StepKind::Finalize);
        assert_eq!(finalize.previous_ids.len(), 2);
    }

    #[test]
    fn test_dedicated_host_template_carries_its_policy() {
        let report = report_writer("task-1");
        let host = DedicatedHost::new("cloud-1", "host-1", "us-south-1", "bx2d-host-152x608");

        let (_root, nodes) =
            compose_dedicated_host_provisioning("task-1", "acct-1", &host, &report).unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].step_kind, StepKind::Create);
        assert_eq!(nodes[0].resource_kind, ResourceKind::DedicatedHost);
        assert_eq!(
            nodes[0].operation,
            Some(OperationKind::DedicatedHostProvision)
        );
        assert_eq!(nodes[1].step_kind, StepKind::Finalize);
    }

    #[test]
    fn test_delete_template_shape() {
        let report = report_writer("task-1");
        let parent = ResourceRecord::VpnGateway(crate::models::VpnGateway::new(
            "cloud-1", "gw-1", "test-vpc",
        ));
        let children: Vec<ResourceRecord> = (1..=3)
            .map(|i| {
                ResourceRecord::VpnConnection(crate::models::VpnConnection::new(
                    "cloud-1",
                    format!("conn-{i}"),
                    "gw-1",
                    "198.51.100.4",
                ))
            })
            .collect();

        let (_root, nodes) =
            compose_delete_with_children("task-1", "acct-1", &parent, &children, &report)
                .unwrap();

        // 3 child deletes + converge + parent delete + finalize
        assert_eq!(nodes.len(), 6);
        let converge = &nodes[3];
        assert_eq!(converge.step_kind, StepKind::Converge);
        assert!(converge.run_on_failure);
        assert_eq!(converge.previous_ids.len(), 3);
        let parent_delete = &nodes[4];
        assert_eq!(parent_delete.step_kind, StepKind::Delete);
        assert_eq!(parent_delete.previous_ids, vec![converge.id]);
    }

    #[test]
    fn test_migration_template_is_a_strict_chain() {
        let report = report_writer("task-1");
        let cluster = KubernetesCluster::new("cloud-1", "us-south", "cluster-1", 3);

        let (_root, nodes) =
            compose_cluster_migration("task-1", "acct-1", &cluster, &report).unwrap();

        assert_eq!(nodes.len(), 4);
        for pair in nodes.windows(2) {
            assert_eq!(pair[0].next_ids, vec![pair[1].id]);
        }
        assert_eq!(nodes[0].step_kind, StepKind::Backup);
        assert_eq!(nodes[1].step_kind, StepKind::Create);
        assert_eq!(nodes[2].step_kind, StepKind::Restore);
        assert_eq!(nodes[3].step_kind, StepKind::Finalize);
    }
}
