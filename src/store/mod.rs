//! # Coordination Store
//!
//! The durable-store seam: every piece of coordination state (task records,
//! sub-tasks, workflow roots/nodes) lives here and is the only channel
//! through which concurrently executing workers communicate. Rows are keyed
//! maps with closure-scoped mutation — the single-writer-at-a-time-per-row
//! discipline the orchestration relies on instead of distributed locks.
//!
//! Production deployments back this seam with the control plane's database;
//! the in-memory implementation carries the same contract.

use crate::models::{SubTask, TaskRecord, WorkflowRoot, WorkflowTask};
use crate::state_machine::{NodeState, SubTaskStatus, TaskStatus};
use dashmap::DashMap;
use uuid::Uuid;

/// Task record rows keyed by task id
#[derive(Debug, Default)]
pub struct TaskStore {
    rows: DashMap<String, TaskRecord>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: TaskRecord) {
        self.rows.insert(task.id.clone(), task);
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.rows.get(task_id).map(|row| row.clone())
    }

    pub fn exists(&self, task_id: &str) -> bool {
        self.rows.contains_key(task_id)
    }

    /// Run a closure against the task row under its lock. All report and
    /// status mutation goes through here, which is what makes concurrent
    /// sibling updates to the same report well-ordered.
    pub fn with_task_mut<R>(
        &self,
        task_id: &str,
        f: impl FnOnce(&mut TaskRecord) -> R,
    ) -> Option<R> {
        self.rows.get_mut(task_id).map(|mut row| f(&mut row))
    }

    /// Apply a task status (first terminal write wins). Returns false when
    /// the task does not exist or the write was ignored.
    pub fn set_status(&self, task_id: &str, status: TaskStatus) -> bool {
        self.with_task_mut(task_id, |task| task.apply_status(status))
            .unwrap_or(false)
    }

    pub fn set_message(&self, task_id: &str, message: impl Into<String>) {
        let message = message.into();
        self.with_task_mut(task_id, |task| task.message = message);
    }
}

/// Ephemeral sub-task rows keyed by execution id
#[derive(Debug, Default)]
pub struct SubTaskStore {
    rows: DashMap<Uuid, SubTask>,
}

impl SubTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, sub_task: SubTask) -> Uuid {
        let id = sub_task.id;
        self.rows.insert(id, sub_task);
        id
    }

    pub fn resolve(&self, id: Uuid, status: SubTaskStatus) {
        if let Some(mut row) = self.rows.get_mut(&id) {
            row.status = status;
        }
    }

    pub fn remove(&self, id: Uuid) -> Option<SubTask> {
        self.rows.remove(&id).map(|(_, sub_task)| sub_task)
    }

    /// Snapshot of every sub-task belonging to a task
    pub fn for_task(&self, task_id: &str) -> Vec<SubTask> {
        self.rows
            .iter()
            .filter(|row| row.task_id == task_id)
            .map(|row| row.clone())
            .collect()
    }
}

/// Workflow roots and DAG node arena
#[derive(Debug, Default)]
pub struct WorkflowStore {
    roots: DashMap<Uuid, WorkflowRoot>,
    nodes: DashMap<Uuid, WorkflowTask>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_root(&self, root: WorkflowRoot) {
        self.roots.insert(root.id, root);
    }

    pub fn insert_node(&self, node: WorkflowTask) {
        self.nodes.insert(node.id, node);
    }

    pub fn root(&self, root_id: Uuid) -> Option<WorkflowRoot> {
        self.roots.get(&root_id).map(|row| row.clone())
    }

    pub fn node(&self, node_id: Uuid) -> Option<WorkflowTask> {
        self.nodes.get(&node_id).map(|row| row.clone())
    }

    pub fn with_root_mut<R>(
        &self,
        root_id: Uuid,
        f: impl FnOnce(&mut WorkflowRoot) -> R,
    ) -> Option<R> {
        self.roots.get_mut(&root_id).map(|mut row| f(&mut row))
    }

    pub fn with_node_mut<R>(
        &self,
        node_id: Uuid,
        f: impl FnOnce(&mut WorkflowTask) -> R,
    ) -> Option<R> {
        self.nodes.get_mut(&node_id).map(|mut row| f(&mut row))
    }

    /// All nodes belonging to a root
    pub fn nodes_for_root(&self, root_id: Uuid) -> Vec<WorkflowTask> {
        let Some(root) = self.root(root_id) else {
            return Vec::new();
        };
        root.associated_task_ids
            .iter()
            .filter_map(|id| self.node(*id))
            .collect()
    }

    /// Node statuses for root-level evaluation
    pub fn node_states_for_root(&self, root_id: Uuid) -> Vec<NodeState> {
        self.nodes_for_root(root_id)
            .iter()
            .map(|node| node.status)
            .collect()
    }

    /// DAG roots: nodes with no declared predecessor (first dispatch wave)
    pub fn entry_nodes(&self, root_id: Uuid) -> Vec<WorkflowTask> {
        self.nodes_for_root(root_id)
            .into_iter()
            .filter(WorkflowTask::is_entry)
            .collect()
    }

    /// The current dispatch frontier of a root
    pub fn in_focus_tasks(&self, root_id: Uuid) -> Vec<WorkflowTask> {
        self.nodes_for_root(root_id)
            .into_iter()
            .filter(|node| node.in_focus)
            .collect()
    }

    /// Live count of callback roots that block the parent's terminal
    /// transition
    pub fn holding_callbacks_count(&self, root_id: Uuid) -> usize {
        let Some(root) = self.root(root_id) else {
            return 0;
        };
        root.callback_ids
            .iter()
            .filter_map(|id| self.root(*id))
            .filter(|cb| cb.hold_parent_status_update && cb.status.holds_parent())
            .count()
    }

    /// Callback roots of a root, resolved from the arena
    pub fn callbacks_for_root(&self, root_id: Uuid) -> Vec<WorkflowRoot> {
        let Some(root) = self.root(root_id) else {
            return Vec::new();
        };
        root.callback_ids
            .iter()
            .filter_map(|id| self.root(*id))
            .collect()
    }
}
