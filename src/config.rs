//! # Configuration
//!
//! Runtime configuration for the orchestration core, loaded from an optional
//! `vpcflow.toml` plus `VPCFLOW_*` environment overrides. Retry/poll
//! parameters are centralized here as named per-operation policies instead
//! of scattered constants.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The operation kinds that carry a named retry/poll policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    VpcProvision,
    SubnetProvision,
    DedicatedHostProvision,
    ResourceDeletion,
    ClusterBackup,
    ClusterProvision,
    ClusterRestore,
    FinalizerDrain,
}

/// Bounded polling policy: fixed sleep, fixed attempt cap. Exhaustion is a
/// fatal failure for the step, not a retryable condition at the wrapper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Number of concurrent step workers consuming the queue
    pub worker_count: usize,
    /// Bounded step-queue capacity
    pub queue_capacity: usize,
    /// Sleep between finalizer drain passes that made no progress
    pub finalizer_poll_ms: u64,
    /// Upper bound on finalizer drain passes before declaring failure
    pub finalizer_max_passes: u32,
    /// Per-operation polling policies
    pub policies: PolicyTable,
}

/// Named per-operation retry policies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTable {
    pub vpc_provision: RetryPolicy,
    pub subnet_provision: RetryPolicy,
    pub dedicated_host_provision: RetryPolicy,
    pub resource_deletion: RetryPolicy,
    pub cluster_backup: RetryPolicy,
    pub cluster_provision: RetryPolicy,
    pub cluster_restore: RetryPolicy,
    pub finalizer_drain: RetryPolicy,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            vpc_provision: RetryPolicy::new(10, 3_000),
            subnet_provision: RetryPolicy::new(10, 3_000),
            // Dedicated hosts are slow to stabilize: retry 6 times, sleep 5s
            dedicated_host_provision: RetryPolicy::new(6, 5_000),
            resource_deletion: RetryPolicy::new(10, 3_000),
            cluster_backup: RetryPolicy::new(30, 10_000),
            cluster_provision: RetryPolicy::new(30, 10_000),
            cluster_restore: RetryPolicy::new(30, 10_000),
            finalizer_drain: RetryPolicy::new(60, 500),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            queue_capacity: 256,
            finalizer_poll_ms: 100,
            finalizer_max_passes: 600,
            policies: PolicyTable::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from `vpcflow.toml` (optional) layered with
    /// `VPCFLOW_*` environment variables.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("vpcflow").required(false))
            .add_source(config::Environment::with_prefix("VPCFLOW").separator("__"))
            .build()
            .map_err(|e| CoreError::ConfigurationError(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| CoreError::ConfigurationError(e.to_string()))
    }

    /// Resolve the named policy for an operation kind
    pub fn retry_policy(&self, operation: OperationKind) -> RetryPolicy {
        match operation {
            OperationKind::VpcProvision => self.policies.vpc_provision,
            OperationKind::SubnetProvision => self.policies.subnet_provision,
            OperationKind::DedicatedHostProvision => self.policies.dedicated_host_provision,
            OperationKind::ResourceDeletion => self.policies.resource_deletion,
            OperationKind::ClusterBackup => self.policies.cluster_backup,
            OperationKind::ClusterProvision => self.policies.cluster_provision,
            OperationKind::ClusterRestore => self.policies.cluster_restore,
            OperationKind::FinalizerDrain => self.policies.finalizer_drain,
        }
    }

    pub fn finalizer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.finalizer_poll_ms)
    }
}
