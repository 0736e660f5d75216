//! # Mock Cloud Gateway
//!
//! In-process gateway with scriptable failures and convergence delays.
//! Failures are queued per `(method, resource name)` and consumed in order,
//! which lets a test fail a call N times and then let it through to
//! exercise retry policies. Creates can be scripted to report `Creating`
//! for a number of fetches before settling, exercising the RunningWait
//! path.

use super::{CloudGateway, ProviderResource};
use crate::models::{CloudAccount, ResourceKey, ResourceRecord};
use crate::orchestration::ProvisionError;
use crate::state_machine::{AccountStatus, ResourceStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use uuid::Uuid;

/// Gateway methods a failure script can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayMethod {
    Create,
    Delete,
    Fetch,
}

#[derive(Default)]
pub struct MockGateway {
    /// Provider-side resource table keyed by resource name
    resources: DashMap<String, ProviderResource>,
    /// Scripted failures consumed in FIFO order per method and name
    failures: DashMap<(GatewayMethod, String), VecDeque<ProvisionError>>,
    /// Remaining fetches a resource reports `Creating` before settling
    converge_after: DashMap<String, u32>,
    /// Chronological record of calls, for assertions
    calls: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next matching call
    pub fn script_failure(
        &self,
        method: GatewayMethod,
        resource_name: impl Into<String>,
        error: ProvisionError,
    ) {
        self.failures
            .entry((method, resource_name.into()))
            .or_default()
            .push_back(error);
    }

    /// Queue the same failure `count` times
    pub fn script_failures(
        &self,
        method: GatewayMethod,
        resource_name: impl Into<String>,
        error: ProvisionError,
        count: u32,
    ) {
        let name = resource_name.into();
        for _ in 0..count {
            self.script_failure(method, name.clone(), error.clone());
        }
    }

    /// Make a created resource report `Creating` for the next `fetches`
    /// fetch calls before settling to `Created`
    pub fn script_slow_convergence(&self, resource_name: impl Into<String>, fetches: u32) {
        self.converge_after.insert(resource_name.into(), fetches);
    }

    /// Calls recorded so far, as `"method resource-name"` strings
    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Whether the provider currently holds the named resource
    pub fn holds(&self, resource_name: &str) -> bool {
        self.resources.contains_key(resource_name)
    }

    /// Provider-side status of the named resource, if present
    pub fn provider_status(&self, resource_name: &str) -> Option<ResourceStatus> {
        self.resources.get(resource_name).map(|r| r.status)
    }

    fn record_call(&self, method: GatewayMethod, name: &str) {
        self.calls.lock().push(format!("{method:?} {name}"));
    }

    fn take_scripted_failure(&self, method: GatewayMethod, name: &str) -> Option<ProvisionError> {
        let mut queue = self.failures.get_mut(&(method, name.to_string()))?;
        queue.pop_front()
    }

    fn check_account(&self, account: &CloudAccount) -> Result<(), ProvisionError> {
        if account.status == AccountStatus::Invalid {
            return Err(ProvisionError::Auth(format!(
                "account {} is invalid",
                account.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CloudGateway for MockGateway {
    async fn create_resource(
        &self,
        account: &CloudAccount,
        record: &ResourceRecord,
    ) -> Result<ProviderResource, ProvisionError> {
        let name = record.name().to_string();
        self.record_call(GatewayMethod::Create, &name);
        self.check_account(account)?;
        if let Some(error) = self.take_scripted_failure(GatewayMethod::Create, &name) {
            return Err(error);
        }

        let status = if self.converge_after.contains_key(&name) {
            ResourceStatus::Creating
        } else {
            ResourceStatus::Created
        };
        let resource = ProviderResource::new(format!("prov-{}", Uuid::new_v4()), status);
        self.resources.insert(name, resource.clone());
        Ok(resource)
    }

    async fn delete_resource(
        &self,
        account: &CloudAccount,
        record: &ResourceRecord,
    ) -> Result<(), ProvisionError> {
        let name = record.name().to_string();
        self.record_call(GatewayMethod::Delete, &name);
        self.check_account(account)?;
        if let Some(error) = self.take_scripted_failure(GatewayMethod::Delete, &name) {
            return Err(error);
        }

        if self.resources.remove(&name).is_none() {
            return Err(ProvisionError::execute(
                404,
                format!("resource {name} not found"),
            ));
        }
        Ok(())
    }

    async fn fetch_resource(
        &self,
        account: &CloudAccount,
        key: &ResourceKey,
    ) -> Result<Option<ProviderResource>, ProvisionError> {
        self.record_call(GatewayMethod::Fetch, &key.name);
        self.check_account(account)?;
        if let Some(error) = self.take_scripted_failure(GatewayMethod::Fetch, &key.name) {
            return Err(error);
        }

        let Some(mut resource) = self.resources.get_mut(&key.name) else {
            return Ok(None);
        };

        if let Some(mut remaining) = self.converge_after.get_mut(&key.name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(Some(resource.clone()));
            }
        }
        resource.status = ResourceStatus::Created;
        Ok(Some(resource.clone()))
    }
}
