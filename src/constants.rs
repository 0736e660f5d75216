//! # System Constants
//!
//! Core constants, status groupings, and report labels that define the
//! operational boundaries of the VPCFlow orchestration core.

// Re-export state types for convenience
pub use crate::state_machine::{
    AccountStatus, NodeState, ReportStatus, ResourceStatus, RootStatus, SubTaskStatus, TaskStatus,
};

/// Report stage names used by the workflow composition templates
pub mod stages {
    pub const PROVISIONING: &str = "PROVISIONING";
    pub const DELETION: &str = "DELETION";
    pub const WORKLOADS_BACKUP: &str = "Workloads Backup";
    pub const CLUSTER_PROVISIONING: &str = "Cluster Provisioning";
    pub const WORKLOADS_RESTORE: &str = "Workloads Restore";
}

/// System-wide constants
pub mod system {
    /// Version compatibility marker
    pub const VPCFLOW_CORE_VERSION: &str = "0.1.0";

    /// Maximum number of nodes in a single workflow root
    pub const MAX_WORKFLOW_NODES: usize = 1000;

    /// Masked message surfaced for business-level task failures
    pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

    /// Message written to nodes that never ran because a predecessor failed
    pub const SKIPPED_PREDECESSOR_FAILED: &str = "Skipped: predecessor failed";
}

/// Status groupings for validation and aggregation logic
pub mod status_groups {
    use super::{NodeState, ReportStatus, RootStatus};

    /// Node states that indicate the node still needs worker attention
    pub const NODE_ACTIVE_STATES: &[NodeState] = &[
        NodeState::Initiated,
        NodeState::Running,
        NodeState::RunningWait,
        NodeState::RunningWaitInitiated,
    ];

    /// Node states that resolve a node
    pub const NODE_TERMINAL_STATES: &[NodeState] = &[NodeState::Successful, NodeState::Failed];

    /// Root statuses that count against a parent's callback gate
    pub const ROOT_HOLDING_STATES: &[RootStatus] = &[
        RootStatus::Pending,
        RootStatus::Initiated,
        RootStatus::Running,
    ];

    /// Report statuses that block parent-level aggregation
    pub const REPORT_UNRESOLVED_STATES: &[ReportStatus] =
        &[ReportStatus::Pending, ReportStatus::InProgress];
}
