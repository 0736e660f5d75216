//! # Step Handler Registry
//!
//! Resolution from `(resource kind, step kind)` to the handler that runs
//! the step. Registration happens once at coordinator construction; lookup
//! is on every dispatch, so the table is a concurrent map of shared
//! handlers.

use crate::error::{CoreError, Result};
use crate::models::resources::ResourceKind;
use crate::models::StepKind;
use crate::orchestration::StepHandler;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<(ResourceKind, StepKind), Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous registration for the pair
    pub fn register(
        &self,
        resource_kind: ResourceKind,
        step_kind: StepKind,
        handler: Arc<dyn StepHandler>,
    ) {
        tracing::debug!(
            resource_kind = %resource_kind,
            step_kind = %step_kind,
            handler = handler.name(),
            "Registered step handler"
        );
        self.handlers.insert((resource_kind, step_kind), handler);
    }

    /// Resolve the handler for a dispatch. A miss is a composition bug, not
    /// a runtime condition, and is surfaced as an error.
    pub fn resolve(
        &self,
        resource_kind: ResourceKind,
        step_kind: StepKind,
    ) -> Result<Arc<dyn StepHandler>> {
        self.handlers
            .get(&(resource_kind, step_kind))
            .map(|entry| Arc::clone(&entry))
            .ok_or_else(|| {
                CoreError::OrchestrationError(format!(
                    "no handler registered for {step_kind} on {resource_kind}"
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registered", &self.handlers.len())
            .finish()
    }
}
