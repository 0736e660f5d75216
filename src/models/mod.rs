//! # Data Models
//!
//! The coordination records every worker communicates through: task records
//! with their structured reports, ephemeral sub-tasks, workflow roots and
//! DAG nodes, and the resource registry entities.

pub mod report;
pub mod resources;
pub mod task;
pub mod workflow_root;
pub mod workflow_task;

pub use report::{Report, ResourceNode, StageNode, SubStepNode, TypeNode};
pub use resources::{
    CloudAccount, CloudProvider, DedicatedHost, KubernetesCluster, LoadBalancer, NetworkAcl,
    ResourceKey, ResourceKind, ResourceRecord, SecurityGroup, Subnet, Vpc, VpnConnection,
    VpnGateway,
};
pub use task::{SubTask, TaskAction, TaskRecord};
pub use workflow_root::{RootKind, WorkflowRoot};
pub use workflow_task::{StepKind, WorkflowTask};
