//! # Workflow Task (DAG Node)
//!
//! One atomic operation on one resource inside a workflow root. Nodes live
//! in an arena keyed by opaque ids; `next_ids`/`previous_ids` adjacency
//! lists form the DAG. A node belongs to exactly one root for its lifetime
//! and edges never cross roots.

use crate::config::OperationKind;
use crate::error::{CoreError, Result};
use crate::models::resources::ResourceKind;
use crate::state_machine::NodeState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The extensible closed set of operation kinds a node can represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Attach,
    Detach,
    Validate,
    Create,
    Delete,
    Discovery,
    Update,
    Restore,
    Map,
    Backup,
    /// Chord finisher: observes its predecessors' outcomes
    Converge,
    /// Task-finalization drain step appended to every chain
    Finalize,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Attach => "ATTACH",
            Self::Detach => "DETACH",
            Self::Validate => "VALIDATE",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Discovery => "DISCOVERY",
            Self::Update => "UPDATE",
            Self::Restore => "RESTORE",
            Self::Map => "MAP",
            Self::Backup => "BACKUP",
            Self::Converge => "CONVERGE",
            Self::Finalize => "FINALIZE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: Uuid,
    /// Owning root; assigned once when the node joins a root
    pub root_id: Uuid,
    pub step_kind: StepKind,
    pub resource_kind: ResourceKind,
    /// Natural name of the resource this node acts on
    pub resource_name: String,
    pub status: NodeState,
    /// Frontier flag: true while the node needs tree-walker attention
    pub in_focus: bool,
    /// Dispatch this node once predecessors are terminal even if some
    /// failed (chord finishers, finalize steps)
    pub run_on_failure: bool,
    /// Named polling policy for RunningWait re-checks, when applicable
    pub operation: Option<OperationKind>,
    /// Poll attempts consumed while in RunningWait
    pub wait_attempts: u32,
    pub task_metadata: Value,
    pub message: String,
    pub next_ids: Vec<Uuid>,
    pub previous_ids: Vec<Uuid>,
}

impl WorkflowTask {
    pub fn new(
        step_kind: StepKind,
        resource_kind: ResourceKind,
        resource_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            root_id: Uuid::nil(),
            step_kind,
            resource_kind,
            resource_name: resource_name.into(),
            status: NodeState::Pending,
            in_focus: false,
            run_on_failure: false,
            operation: None,
            wait_attempts: 0,
            task_metadata: Value::Null,
            message: String::new(),
            next_ids: Vec::new(),
            previous_ids: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.task_metadata = metadata;
        self
    }

    pub fn with_operation(mut self, operation: OperationKind) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Mark the node dispatchable even when a predecessor failed
    pub fn run_on_failure(mut self) -> Self {
        self.run_on_failure = true;
        self
    }

    /// Append a successor edge. Both ends must already belong to the same
    /// root; cross-root edges are a programming error surfaced as a checked
    /// precondition.
    pub fn add_next_task(&mut self, next: &mut WorkflowTask) -> Result<()> {
        Self::check_same_root(self, next)?;
        if !self.next_ids.contains(&next.id) {
            self.next_ids.push(next.id);
        }
        if !next.previous_ids.contains(&self.id) {
            next.previous_ids.push(self.id);
        }
        Ok(())
    }

    /// Append a predecessor edge (inverse of `add_next_task`)
    pub fn add_previous_task(&mut self, previous: &mut WorkflowTask) -> Result<()> {
        previous.add_next_task(self)
    }

    fn check_same_root(a: &WorkflowTask, b: &WorkflowTask) -> Result<()> {
        if a.root_id.is_nil() || b.root_id.is_nil() {
            return Err(CoreError::CompositionError(
                "cannot add an edge before both tasks belong to a root".to_string(),
            ));
        }
        if a.root_id != b.root_id {
            return Err(CoreError::CompositionError(format!(
                "edge would cross roots {} and {}",
                a.root_id, b.root_id
            )));
        }
        Ok(())
    }

    /// Node has no declared predecessor — part of the first dispatch wave
    pub fn is_entry(&self) -> bool {
        self.previous_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_in_root(root_id: Uuid) -> WorkflowTask {
        let mut node = WorkflowTask::new(StepKind::Create, ResourceKind::Subnet, "subnet-1");
        node.root_id = root_id;
        node
    }

    #[test]
    fn test_add_next_task_links_both_ends() {
        let root_id = Uuid::new_v4();
        let mut a = node_in_root(root_id);
        let mut b = node_in_root(root_id);

        a.add_next_task(&mut b).unwrap();
        assert_eq!(a.next_ids, vec![b.id]);
        assert_eq!(b.previous_ids, vec![a.id]);
        assert!(a.is_entry());
        assert!(!b.is_entry());
    }

    #[test]
    fn test_edges_never_cross_roots() {
        let mut a = node_in_root(Uuid::new_v4());
        let mut b = node_in_root(Uuid::new_v4());

        let err = a.add_next_task(&mut b).unwrap_err();
        assert!(matches!(err, CoreError::CompositionError(_)));
    }

    #[test]
    fn test_edge_requires_root_membership() {
        let root_id = Uuid::new_v4();
        let mut a = node_in_root(root_id);
        let mut unowned = WorkflowTask::new(StepKind::Delete, ResourceKind::Vpc, "vpc-1");

        assert!(a.add_next_task(&mut unowned).is_err());
    }

    #[test]
    fn test_duplicate_edges_are_collapsed() {
        let root_id = Uuid::new_v4();
        let mut a = node_in_root(root_id);
        let mut b = node_in_root(root_id);

        a.add_next_task(&mut b).unwrap();
        a.add_next_task(&mut b).unwrap();
        assert_eq!(a.next_ids.len(), 1);
        assert_eq!(b.previous_ids.len(), 1);
    }
}
