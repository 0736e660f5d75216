//! # Resource Registry
//!
//! The durable resource catalog workflows reconcile against. Rows are keyed
//! by `(cloud_id, kind, name)`; `add_update` is the idempotent upsert the
//! reconciliation contract is built on: an incoming record that matches the
//! stored row parameter-for-parameter leaves the row untouched, a differing
//! one patches the row in place while preserving the internal ids of the
//! row and of every child that survives the merge by name.

use crate::models::resources::{CloudAccount, ResourceIdentity};
use crate::models::{ResourceKey, ResourceRecord};
use crate::state_machine::{AccountStatus, ResourceStatus};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    rows: DashMap<ResourceKey, ResourceRecord>,
    accounts: DashMap<String, CloudAccount>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the stored row for a record's natural key
    pub fn get_existing(&self, key: &ResourceKey) -> Option<ResourceRecord> {
        self.rows.get(key).map(|row| row.clone())
    }

    /// Idempotent upsert. Returns the row as stored after the call:
    /// the unchanged row when parameters already match, the patched row
    /// (internal ids preserved) when they differ, or the incoming record
    /// verbatim when the key was absent.
    pub fn add_update(&self, incoming: ResourceRecord) -> ResourceRecord {
        let key = incoming.key();
        match self.get_existing(&key) {
            Some(existing) if existing.params_eq(&incoming) => {
                tracing::debug!(
                    kind = %incoming.kind(),
                    name = %incoming.name(),
                    "Registry row already up to date"
                );
                existing
            }
            Some(existing) => {
                let merged = merge_preserving_ids(&existing, incoming);
                tracing::info!(
                    kind = %merged.kind(),
                    name = %merged.name(),
                    "Patched registry row in place"
                );
                self.rows.insert(key, merged.clone());
                merged
            }
            None => {
                tracing::info!(
                    kind = %incoming.kind(),
                    name = %incoming.name(),
                    "Created registry row"
                );
                self.rows.insert(key, incoming.clone());
                incoming
            }
        }
    }

    pub fn remove(&self, key: &ResourceKey) -> Option<ResourceRecord> {
        self.rows.remove(key).map(|(_, row)| row)
    }

    pub fn set_status(&self, key: &ResourceKey, status: ResourceStatus) -> bool {
        match self.rows.get_mut(key) {
            Some(mut row) => {
                row.set_status(status);
                true
            }
            None => false,
        }
    }

    pub fn set_provider_id(&self, key: &ResourceKey, provider_id: impl Into<String>) -> bool {
        match self.rows.get_mut(key) {
            Some(mut row) => {
                row.set_provider_id(provider_id);
                true
            }
            None => false,
        }
    }

    /// Map the row's in-flight status to its error counterpart. Rows in a
    /// settled status are left untouched so an unrelated step failure never
    /// corrupts a resource that already converged.
    pub fn apply_error_status(&self, key: &ResourceKey) -> Option<ResourceStatus> {
        let mut row = self.rows.get_mut(key)?;
        let error_status = row.status().error_transition()?;
        row.set_status(error_status);
        tracing::warn!(
            kind = %row.kind(),
            name = %row.name(),
            status = %error_status,
            "Applied error status to registry row"
        );
        Some(error_status)
    }

    /// All rows belonging to a cloud, for deletion planning and listings
    pub fn resources_for_cloud(&self, cloud_id: &str) -> Vec<ResourceRecord> {
        self.rows
            .iter()
            .filter(|row| row.cloud_id() == cloud_id)
            .map(|row| row.clone())
            .collect()
    }

    pub fn upsert_account(&self, account: CloudAccount) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn account(&self, account_id: &str) -> Option<CloudAccount> {
        self.accounts.get(account_id).map(|row| row.clone())
    }

    /// Authentication failures invalidate the whole account, not just the
    /// resource being provisioned
    pub fn mark_account_invalid(&self, account_id: &str) -> bool {
        match self.accounts.get_mut(account_id) {
            Some(mut account) => {
                account.status = AccountStatus::Invalid;
                tracing::warn!(account_id = %account.id, "Marked cloud account INVALID");
                true
            }
            None => false,
        }
    }
}

/// Patch `existing` with `incoming`'s parameters while keeping the stored
/// internal ids. Children are matched by name: a surviving child keeps its
/// stored id, a new child keeps the incoming id, a vanished child is
/// dropped.
fn merge_preserving_ids(existing: &ResourceRecord, mut incoming: ResourceRecord) -> ResourceRecord {
    match (&mut incoming, existing) {
        (ResourceRecord::Vpc(new), ResourceRecord::Vpc(old)) => {
            new.id = old.id;
            for subnet in &mut new.subnets {
                if let Some(kept) = old.subnets.iter().find(|s| s.name == subnet.name) {
                    subnet.set_internal_id(kept.internal_id());
                }
            }
        }
        (ResourceRecord::VpnGateway(new), ResourceRecord::VpnGateway(old)) => {
            new.id = old.id;
            for connection in &mut new.connections {
                if let Some(kept) = old.connections.iter().find(|c| c.name == connection.name) {
                    connection.set_internal_id(kept.internal_id());
                }
            }
        }
        (new, _) => {
            let id = existing.internal_id();
            match new {
                ResourceRecord::Subnet(r) => r.set_internal_id(id),
                ResourceRecord::SecurityGroup(r) => r.set_internal_id(id),
                ResourceRecord::NetworkAcl(r) => r.set_internal_id(id),
                ResourceRecord::LoadBalancer(r) => r.set_internal_id(id),
                ResourceRecord::VpnConnection(r) => r.set_internal_id(id),
                ResourceRecord::DedicatedHost(r) => r.set_internal_id(id),
                ResourceRecord::KubernetesCluster(r) => r.set_internal_id(id),
                ResourceRecord::ResourceGroup(r) => r.set_internal_id(id),
                ResourceRecord::Vpc(_) | ResourceRecord::VpnGateway(_) => unreachable!(),
            }
        }
    }
    incoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CloudProvider, Subnet, Vpc};

    fn vpc_record() -> ResourceRecord {
        ResourceRecord::Vpc(
            Vpc::new("cloud-1", "us-south", "test-vpc").with_subnet(Subnet::new(
                "cloud-1",
                "us-south",
                "subnet-1",
                "test-vpc",
                "10.0.1.0/24",
            )),
        )
    }

    #[test]
    fn test_add_update_is_idempotent() {
        let registry = ResourceRegistry::new();
        let stored = registry.add_update(vpc_record());

        // Same parameters, fresh internal ids: the stored row must not move
        let stored_again = registry.add_update(stored.make_copy());
        assert_eq!(stored_again.internal_id(), stored.internal_id());
        assert_eq!(registry.get_existing(&stored.key()).unwrap(), stored);
    }

    #[test]
    fn test_add_update_patches_preserving_child_ids() {
        let registry = ResourceRegistry::new();
        let stored = registry.add_update(vpc_record());
        let stored_subnet_id = match &stored {
            ResourceRecord::Vpc(vpc) => vpc.subnets[0].id,
            _ => unreachable!(),
        };

        let mut changed = stored.make_copy();
        if let ResourceRecord::Vpc(vpc) = &mut changed {
            vpc.address_prefixes.push("10.0.0.0/16".to_string());
            vpc.subnets.push(Subnet::new(
                "cloud-1",
                "us-south",
                "subnet-2",
                "test-vpc",
                "10.0.2.0/24",
            ));
        }

        let merged = registry.add_update(changed);
        let ResourceRecord::Vpc(vpc) = &merged else {
            unreachable!()
        };
        assert_eq!(merged.internal_id(), stored.internal_id());
        assert_eq!(vpc.subnets.len(), 2);
        assert_eq!(vpc.subnets[0].id, stored_subnet_id);
        assert_ne!(vpc.subnets[1].id, stored_subnet_id);
    }

    #[test]
    fn test_apply_error_status_only_hits_in_flight_rows() {
        let registry = ResourceRegistry::new();
        let stored = registry.add_update(vpc_record());
        let key = stored.key();

        registry.set_status(&key, ResourceStatus::Creating);
        assert_eq!(
            registry.apply_error_status(&key),
            Some(ResourceStatus::ErrorCreating)
        );

        registry.set_status(&key, ResourceStatus::Created);
        assert_eq!(registry.apply_error_status(&key), None);
        assert_eq!(
            registry.get_existing(&key).unwrap().status(),
            ResourceStatus::Created
        );
    }

    #[test]
    fn test_deleting_error_transition() {
        let registry = ResourceRegistry::new();
        let stored = registry.add_update(vpc_record());
        let key = stored.key();

        registry.set_status(&key, ResourceStatus::Deleting);
        assert_eq!(
            registry.apply_error_status(&key),
            Some(ResourceStatus::ErrorDeleting)
        );
    }

    #[test]
    fn test_resources_for_cloud_filters_by_cloud() {
        let registry = ResourceRegistry::new();
        registry.add_update(vpc_record());
        registry.add_update(ResourceRecord::Vpc(Vpc::new(
            "cloud-2", "us-south", "other-vpc",
        )));

        let rows = registry.resources_for_cloud("cloud-1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name(), "test-vpc");
        assert!(registry.resources_for_cloud("cloud-404").is_empty());
    }

    #[test]
    fn test_remove() {
        let registry = ResourceRegistry::new();
        let stored = registry.add_update(vpc_record());
        assert!(registry.remove(&stored.key()).is_some());
        assert!(registry.get_existing(&stored.key()).is_none());
    }

    #[test]
    fn test_account_invalidation() {
        let registry = ResourceRegistry::new();
        registry.upsert_account(CloudAccount::new("acct-1", "primary", CloudProvider::Ibm));

        assert!(registry.mark_account_invalid("acct-1"));
        assert_eq!(
            registry.account("acct-1").unwrap().status,
            AccountStatus::Invalid
        );
        assert!(!registry.mark_account_invalid("acct-404"));
    }
}
