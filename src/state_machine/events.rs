use serde::{Deserialize, Serialize};

/// Events that move a workflow root through its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RootEvent {
    /// A parent root's terminal status released this callback root
    Trigger,
    /// The first wave of tasks was dispatched
    Initiate,
    /// A task of this root began executing
    TaskStarted,
    /// All own tasks resolved successfully
    CompleteSuccessfully { waiting_for_callbacks: bool },
    /// At least one task resolved with a failure
    CompleteWithFailure { waiting_for_callbacks: bool },
    /// The last holding callback resolved, lifting the Wfc gate
    CallbacksResolved,
}

impl RootEvent {
    /// String representation of the event kind for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Initiate => "initiate",
            Self::TaskStarted => "task_started",
            Self::CompleteSuccessfully { .. } => "complete_successfully",
            Self::CompleteWithFailure { .. } => "complete_with_failure",
            Self::CallbacksResolved => "callbacks_resolved",
        }
    }
}

/// Events that move a workflow DAG node through its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NodeEvent {
    /// The node was placed on the step queue
    Dispatch,
    /// A worker picked the node up
    Start,
    /// The step must poll an external system before resolving
    Wait,
    /// A scheduled poll message is being processed
    PollStart,
    /// The step resolved successfully
    Succeed,
    /// The step resolved with a failure message
    Fail(String),
}

impl NodeEvent {
    /// String representation of the event kind for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Start => "start",
            Self::Wait => "wait",
            Self::PollStart => "poll_start",
            Self::Succeed => "succeed",
            Self::Fail(_) => "fail",
        }
    }

    /// Extract the failure message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }
}

impl NodeEvent {
    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
