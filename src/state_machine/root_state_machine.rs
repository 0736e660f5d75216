//! # Root Status Evaluation
//!
//! Pure transition logic for workflow roots and DAG nodes. The workflow
//! coordinator persists the results; nothing here touches a store, which
//! keeps the transition rules unit-testable in isolation.

use super::events::{NodeEvent, RootEvent};
use super::states::{NodeState, RootStatus};

/// Errors raised by invalid state transitions
#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("Invalid transition from {from:?} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Internal state machine error: {0}")]
    Internal(String),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Determine the target root status for an event
pub fn root_target_state(
    current: RootStatus,
    event: &RootEvent,
) -> StateMachineResult<RootStatus> {
    let target = match (current, event) {
        (RootStatus::OnHold, RootEvent::Trigger) => RootStatus::Pending,
        (RootStatus::Pending, RootEvent::Initiate) => RootStatus::Initiated,
        (RootStatus::Initiated | RootStatus::Running, RootEvent::TaskStarted) => {
            RootStatus::Running
        }

        (
            RootStatus::Initiated | RootStatus::Running,
            RootEvent::CompleteSuccessfully {
                waiting_for_callbacks,
            },
        ) => {
            if *waiting_for_callbacks {
                RootStatus::CompletedSuccessfullyWfc
            } else {
                RootStatus::CompletedSuccessfully
            }
        }
        (
            RootStatus::Initiated | RootStatus::Running,
            RootEvent::CompleteWithFailure {
                waiting_for_callbacks,
            },
        ) => {
            if *waiting_for_callbacks {
                RootStatus::CompletedWithFailureWfc
            } else {
                RootStatus::CompletedWithFailure
            }
        }

        // Lifting the callback gate is the only legal exit from a Wfc status
        (RootStatus::CompletedSuccessfullyWfc, RootEvent::CallbacksResolved) => {
            RootStatus::CompletedSuccessfully
        }
        (RootStatus::CompletedWithFailureWfc, RootEvent::CallbacksResolved) => {
            RootStatus::CompletedWithFailure
        }

        (from, event) => {
            return Err(StateMachineError::InvalidTransition {
                from: from.to_string(),
                event: event.event_type().to_string(),
            })
        }
    };

    Ok(target)
}

/// Determine the target node state for an event
pub fn node_target_state(current: NodeState, event: &NodeEvent) -> StateMachineResult<NodeState> {
    let target = match (current, event) {
        (NodeState::Pending, NodeEvent::Dispatch) => NodeState::Initiated,
        (NodeState::Initiated, NodeEvent::Start) => NodeState::Running,
        (NodeState::Running, NodeEvent::Wait) => NodeState::RunningWait,
        (NodeState::RunningWait, NodeEvent::PollStart) => NodeState::RunningWaitInitiated,
        // A poll that comes back unready re-enters the wait state
        (NodeState::RunningWaitInitiated, NodeEvent::Wait) => NodeState::RunningWait,

        (
            NodeState::Running | NodeState::RunningWaitInitiated,
            NodeEvent::Succeed,
        ) => NodeState::Successful,

        // Failure is accepted from any non-terminal state: skip-propagation
        // fails nodes that were never dispatched.
        (state, NodeEvent::Fail(_)) if !state.is_terminal() => NodeState::Failed,

        (from, event) => {
            return Err(StateMachineError::InvalidTransition {
                from: from.to_string(),
                event: event.event_type().to_string(),
            })
        }
    };

    Ok(target)
}

/// Outcome of evaluating a root's node set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootEvaluation {
    /// At least one node is still pending or active
    InFlight,
    /// Every node is Successful
    AllSuccessful,
    /// At least one node Failed and none remain non-terminal
    SettledWithFailure,
}

/// Evaluate the aggregate outcome of a root's associated nodes.
///
/// The caller combines this with `holding_callbacks_count` to choose
/// between the terminal status and its Wfc variant.
pub fn evaluate_nodes(states: &[NodeState]) -> RootEvaluation {
    let any_failed = states.iter().any(|s| *s == NodeState::Failed);
    let any_unresolved = states.iter().any(|s| !s.is_terminal());

    if any_unresolved {
        RootEvaluation::InFlight
    } else if any_failed {
        RootEvaluation::SettledWithFailure
    } else {
        RootEvaluation::AllSuccessful
    }
}
