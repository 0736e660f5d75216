use serde::{Deserialize, Serialize};
use std::fmt;

/// Task record status — one durable record per user- or system-initiated
/// operation. Terminal once Success or Failed is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Initial status stamped by the request handler
    Created,
    /// Every unit of work belonging to the task resolved successfully
    Success,
    /// At least one unit of work resolved with a failure
    Failed,
}

impl TaskStatus {
    /// Check if this is a terminal status (completion timestamp stamped)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Status of one ephemeral execution-unit record belonging to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubTaskStatus {
    /// The owning execution unit is still in flight
    Running,
    Success,
    Failed,
}

impl SubTaskStatus {
    /// A resolved sub-task can be drained by the task finalizer
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Workflow root status lifecycle.
///
/// `OnHold → Pending → Initiated → Running →
/// {CompletedSuccessfully[Wfc] | CompletedWithFailure[Wfc]}`
///
/// The `*Wfc` (waiting-for-callbacks) variants are reached when the root's
/// own tasks are all terminal but one or more callback roots with
/// `hold_parent_status_update` are still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RootStatus {
    /// Callback roots wait here until their parent reaches a terminal status
    OnHold,
    Pending,
    Initiated,
    Running,
    CompletedSuccessfully,
    CompletedWithFailure,
    /// All own tasks successful, holding callbacks still outstanding
    CompletedSuccessfullyWfc,
    /// Failure observed, holding callbacks still outstanding
    CompletedWithFailureWfc,
}

impl RootStatus {
    /// Fully terminal — no pending callback gate remains
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CompletedSuccessfully | Self::CompletedWithFailure)
    }

    /// Own tasks are all resolved, possibly still gated on callbacks
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::CompletedSuccessfully
                | Self::CompletedWithFailure
                | Self::CompletedSuccessfullyWfc
                | Self::CompletedWithFailureWfc
        )
    }

    /// Check if the root counts against its parent's callback gate
    pub fn holds_parent(&self) -> bool {
        matches!(self, Self::Pending | Self::Initiated | Self::Running)
    }

    /// Settled with a successful outcome (Wfc variant included)
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            Self::CompletedSuccessfully | Self::CompletedSuccessfullyWfc
        )
    }
}

/// Workflow DAG node status lifecycle.
///
/// `Pending → Initiated → Running → {RunningWait → RunningWaitInitiated}* →
/// {Successful | Failed}`
///
/// The `RunningWait*` pair models steps that must poll an external system
/// (e.g. waiting for a provider resource to reach a stable state) before
/// declaring completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Pending,
    Initiated,
    Running,
    /// Blocked on an external system, a poll message has been scheduled
    RunningWait,
    /// The scheduled poll message is being processed
    RunningWaitInitiated,
    Successful,
    Failed,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }

    /// Node is actively progressing (dispatched but not resolved)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Initiated | Self::Running | Self::RunningWait | Self::RunningWaitInitiated
        )
    }
}

/// Status carried by every node of a task's hierarchical report
/// (stage → resource type → resource → sub-step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Cancelled,
}

impl ReportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Unresolved statuses block parent-level aggregation
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

/// Resource registry status vocabulary.
///
/// Error transitions are one-way: a resource never silently reverts out of
/// an `Error*` status; remediation requires a subsequent workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    CreationPending,
    Creating,
    Created,
    Updating,
    Deleting,
    Deleted,
    ErrorCreating,
    ErrorDeleting,
}

impl ResourceStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ErrorCreating | Self::ErrorDeleting)
    }

    /// The error status a failure transitions this status into, if any.
    ///
    /// A resource that is not mid-flight (e.g. Created, awaiting its own
    /// delete step) keeps its current status on failure.
    pub fn error_transition(&self) -> Option<ResourceStatus> {
        match self {
            Self::Deleting => Some(Self::ErrorDeleting),
            Self::CreationPending | Self::Creating | Self::Updating => Some(Self::ErrorCreating),
            _ => None,
        }
    }
}

/// Cloud account status — flipped to Invalid by authentication failures
/// independent of which resource operation triggered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Valid,
    Invalid,
}

macro_rules! impl_status_strings {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $(Self::$variant => $text),+
                };
                write!(f, "{s}")
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("Invalid ", stringify!($ty), ": {}"), s)),
                }
            }
        }
    };
}

impl_status_strings!(TaskStatus {
    Created => "CREATED",
    Success => "SUCCESS",
    Failed => "FAILED",
});

impl_status_strings!(SubTaskStatus {
    Running => "RUNNING",
    Success => "SUCCESS",
    Failed => "FAILED",
});

impl_status_strings!(RootStatus {
    OnHold => "ON_HOLD",
    Pending => "PENDING",
    Initiated => "INITIATED",
    Running => "RUNNING",
    CompletedSuccessfully => "COMPLETED_SUCCESSFULLY",
    CompletedWithFailure => "COMPLETED_WITH_FAILURE",
    CompletedSuccessfullyWfc => "COMPLETED_SUCCESSFULLY_WFC",
    CompletedWithFailureWfc => "COMPLETED_WITH_FAILURE_WFC",
});

impl_status_strings!(NodeState {
    Pending => "PENDING",
    Initiated => "INITIATED",
    Running => "RUNNING",
    RunningWait => "RUNNING_WAIT",
    RunningWaitInitiated => "RUNNING_WAIT_INITIATED",
    Successful => "SUCCESSFUL",
    Failed => "FAILED",
});

impl_status_strings!(ReportStatus {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Success => "SUCCESS",
    Failed => "FAILED",
    Cancelled => "CANCELLED",
});

impl_status_strings!(ResourceStatus {
    CreationPending => "CREATION_PENDING",
    Creating => "CREATING",
    Created => "CREATED",
    Updating => "UPDATING",
    Deleting => "DELETING",
    Deleted => "DELETED",
    ErrorCreating => "ERROR_CREATING",
    ErrorDeleting => "ERROR_DELETING",
});

impl_status_strings!(AccountStatus {
    Valid => "VALID",
    Invalid => "INVALID",
});

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Created
    }
}

impl Default for NodeState {
    fn default() -> Self {
        Self::Pending
    }
}

impl Default for ReportStatus {
    fn default() -> Self {
        Self::Pending
    }
}
