//! # Orchestration Types
//!
//! The step execution vocabulary: the provisioning error taxonomy, the
//! per-invocation context handed to handlers, the handler trait itself, and
//! the queue/outcome types that tie dispatch, execution and finalization
//! together.

use crate::config::OrchestratorConfig;
use crate::constants::system::INTERNAL_ERROR_MESSAGE;
use crate::models::WorkflowTask;
use crate::registry::ResourceRegistry;
use crate::services::CloudGateway;
use crate::store::{SubTaskStore, TaskStore, WorkflowStore};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Classified provisioning failure. The variant drives registry side
/// effects (account invalidation, resource error statuses), user-message
/// masking, and workflow truncation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProvisionError {
    /// Credential rejected by the provider; invalidates the cloud account
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider endpoint unreachable
    #[error("cannot connect to provider: {0}")]
    Connect(String),

    /// Provider accepted the call and returned an error response
    #[error("provider call failed with {code}: {message}")]
    Execute { code: u16, message: String },

    /// The request itself is malformed; surfaced verbatim to the caller
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal orchestration failure; masked in user-facing output
    #[error("{0}")]
    TaskFailure(String),

    /// Deliberate truncation of the whole workflow tree, message included
    /// verbatim in the task record
    #[error("workflow terminated: {0}")]
    WorkflowTerminated(String),
}

impl ProvisionError {
    pub fn execute(code: u16, message: impl Into<String>) -> Self {
        Self::Execute {
            code,
            message: message.into(),
        }
    }

    /// Provider said the resource does not exist. On deletes this is
    /// success-equivalent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Execute { code: 404, .. })
    }

    /// The message written to user-visible records. Internal failures are
    /// masked; everything else carries its own text.
    pub fn user_message(&self) -> String {
        match self {
            Self::TaskFailure(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            Self::WorkflowTerminated(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Whether a queued request is a first dispatch or a RunningWait re-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Dispatch,
    Poll,
}

/// One unit of work on the step queue
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub node_id: Uuid,
    pub attempt: Attempt,
}

impl StepRequest {
    pub fn dispatch(node_id: Uuid) -> Self {
        Self {
            node_id,
            attempt: Attempt::Dispatch,
        }
    }

    pub fn poll(node_id: Uuid) -> Self {
        Self {
            node_id,
            attempt: Attempt::Poll,
        }
    }
}

/// What a handler invocation produced: the step is done, or the underlying
/// provider operation is still converging and the node must wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutput {
    Done,
    Waiting,
}

/// Terminal classification of one executor run, reported back to the
/// coordinator for tree advancement.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded,
    Waiting,
    Failed(ProvisionError),
}

/// Everything a handler needs for one invocation: the node snapshot, the
/// stage it reports into, and shared handles to the coordination stores.
#[derive(Clone)]
pub struct StepContext {
    pub node: WorkflowTask,
    pub task_id: String,
    pub stage: String,
    pub tasks: Arc<TaskStore>,
    pub sub_tasks: Arc<SubTaskStore>,
    pub workflows: Arc<WorkflowStore>,
    pub registry: Arc<ResourceRegistry>,
    pub gateway: Arc<dyn CloudGateway>,
    pub config: Arc<OrchestratorConfig>,
}

impl StepContext {
    /// Resource record carried in the node's metadata, when the composition
    /// embedded one
    pub fn resource_from_metadata(&self) -> Option<crate::models::ResourceRecord> {
        serde_json::from_value(self.node.task_metadata.get("resource")?.clone()).ok()
    }

    /// Cloud account id the node operates under
    pub fn account_id(&self) -> Option<&str> {
        self.node.task_metadata.get("account_id")?.as_str()
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("node", &self.node.id)
            .field("task_id", &self.task_id)
            .field("stage", &self.stage)
            .finish()
    }
}

/// One resource operation step. Implementations hold no per-invocation
/// state; everything arrives through the context.
#[async_trait]
pub trait StepHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the executor registers a SubTask for this step. Finalization
    /// steps return false so the drain they perform cannot wait on itself.
    fn creates_sub_task(&self) -> bool {
        true
    }

    /// First dispatch of the step
    async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, ProvisionError>;

    /// RunningWait re-check. Only called on handlers that returned
    /// `Waiting` from `execute`.
    async fn poll(&self, _ctx: &StepContext) -> Result<StepOutput, ProvisionError> {
        Ok(StepOutput::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(ProvisionError::execute(404, "no such vpc").is_not_found());
        assert!(!ProvisionError::execute(500, "boom").is_not_found());
        assert!(!ProvisionError::Auth("denied".to_string()).is_not_found());
    }

    #[test]
    fn test_internal_failures_are_masked() {
        let err = ProvisionError::TaskFailure("report writer poisoned".to_string());
        assert_eq!(err.user_message(), INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_termination_message_passes_through() {
        let err = ProvisionError::WorkflowTerminated(
            "Workloads Backup, Backup Creation Failed".to_string(),
        );
        assert_eq!(err.user_message(), "Workloads Backup, Backup Creation Failed");
    }

    #[test]
    fn test_invalid_request_passes_through() {
        let err = ProvisionError::InvalidRequest("cidr overlaps existing subnet".to_string());
        assert!(err.user_message().contains("cidr overlaps"));
    }
}
