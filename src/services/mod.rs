//! # Provider Services
//!
//! The cloud gateway seam: the async interface through which every step
//! handler talks to a provider, and the scriptable in-process
//! implementation the tests and the demo run against.

pub mod mock_gateway;

pub use mock_gateway::MockGateway;

use crate::models::{CloudAccount, ResourceKey, ResourceRecord};
use crate::orchestration::ProvisionError;
use crate::state_machine::ResourceStatus;
use async_trait::async_trait;

/// Provider-side view of a resource after a gateway call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResource {
    pub provider_id: String,
    pub status: ResourceStatus,
}

impl ProviderResource {
    pub fn new(provider_id: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            provider_id: provider_id.into(),
            status,
        }
    }
}

/// Asynchronous provider operations. Every call authenticates under the
/// given account; errors come back classified so callers can route side
/// effects without parsing messages.
#[async_trait]
pub trait CloudGateway: Send + Sync {
    /// Start creating a resource. A `Creating` status in the response means
    /// the provider is still converging and the caller must poll.
    async fn create_resource(
        &self,
        account: &CloudAccount,
        record: &ResourceRecord,
    ) -> Result<ProviderResource, ProvisionError>;

    /// Delete a resource. A 404 from the provider is surfaced as
    /// `Execute { code: 404, .. }`; callers treat it as already deleted.
    async fn delete_resource(
        &self,
        account: &CloudAccount,
        record: &ResourceRecord,
    ) -> Result<(), ProvisionError>;

    /// Fetch the provider-side state of a resource; `None` means the
    /// provider has no such resource.
    async fn fetch_resource(
        &self,
        account: &CloudAccount,
        key: &ResourceKey,
    ) -> Result<Option<ProviderResource>, ProvisionError>;
}
