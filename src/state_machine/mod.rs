//! # State Machine Module
//!
//! Status vocabularies and transition rules for every coordinated entity:
//! task records, sub-tasks, workflow roots, DAG nodes, report nodes, and
//! registry resources. Transitions are pure functions; persistence of the
//! outcomes is the workflow coordinator's job.

pub mod events;
pub mod root_state_machine;
pub mod states;

pub use events::{NodeEvent, RootEvent};
pub use root_state_machine::{
    evaluate_nodes, node_target_state, root_target_state, RootEvaluation, StateMachineError,
    StateMachineResult,
};
pub use states::{
    AccountStatus, NodeState, ReportStatus, ResourceStatus, RootStatus, SubTaskStatus, TaskStatus,
};
