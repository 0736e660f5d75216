//! # Resource Entities
//!
//! The durable catalog entries of the Resource Registry: VPCs, subnets,
//! security groups, ACLs, load balancers, VPN gateways, dedicated hosts and
//! Kubernetes clusters, each carrying an internal id, a provider-assigned
//! `provider_id`, and a status from the closed registry vocabulary.
//!
//! Every record supports the reconciliation contract the provisioning
//! workflows depend on: `make_copy()` (detached deep clone), `params_eq()`
//! (structural equality excluding internal ids), and the registry's
//! `add_update` idempotent upsert.

use crate::state_machine::{AccountStatus, ResourceStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The closed set of resource kinds the registry catalogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    SecurityGroup,
    NetworkAcl,
    LoadBalancer,
    VpnGateway,
    VpnConnection,
    DedicatedHost,
    KubernetesCluster,
    ResourceGroup,
}

impl ResourceKind {
    /// Kinds that appear at most once per task. Their report summary is
    /// their own message rather than an aggregate "see details" message.
    pub fn is_singleton_per_task(&self) -> bool {
        matches!(self, Self::Vpc | Self::ResourceGroup)
    }

    /// Human-facing label used as the resource-type key in task reports
    pub fn report_label(&self) -> &'static str {
        match self {
            Self::Vpc => "VPC",
            Self::Subnet => "Subnets",
            Self::SecurityGroup => "Security Groups",
            Self::NetworkAcl => "Network ACLs",
            Self::LoadBalancer => "Load Balancers",
            Self::VpnGateway => "VPN Gateways",
            Self::VpnConnection => "VPN Connections",
            Self::DedicatedHost => "Dedicated Hosts",
            Self::KubernetesCluster => "Kubernetes Clusters",
            Self::ResourceGroup => "Resource Group",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.report_label())
    }
}

/// Natural key identifying one registry row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub cloud_id: String,
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceKey {
    pub fn new(cloud_id: impl Into<String>, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            cloud_id: cloud_id.into(),
            kind,
            name: name.into(),
        }
    }
}

/// Identity surface shared by all resource entities, used by the child
/// diff-and-patch merge in the registry.
pub trait ResourceIdentity {
    fn internal_id(&self) -> Uuid;
    fn set_internal_id(&mut self, id: Uuid);
    fn name(&self) -> &str;
}

macro_rules! impl_identity {
    ($ty:ident) => {
        impl ResourceIdentity for $ty {
            fn internal_id(&self) -> Uuid {
                self.id
            }

            fn set_internal_id(&mut self, id: Uuid) {
                self.id = id;
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
    pub id: Uuid,
    pub cloud_id: String,
    pub region: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub address_prefixes: Vec<String>,
    pub subnets: Vec<Subnet>,
}

impl Vpc {
    pub fn new(cloud_id: impl Into<String>, region: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cloud_id: cloud_id.into(),
            region: region.into(),
            name: name.into(),
            status: ResourceStatus::CreationPending,
            provider_id: None,
            address_prefixes: Vec::new(),
            subnets: Vec::new(),
        }
    }

    pub fn with_subnet(mut self, subnet: Subnet) -> Self {
        self.subnets.push(subnet);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: Uuid,
    pub cloud_id: String,
    pub region: String,
    pub zone: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub cidr: String,
    pub vpc_name: String,
}

impl Subnet {
    pub fn new(
        cloud_id: impl Into<String>,
        region: impl Into<String>,
        name: impl Into<String>,
        vpc_name: impl Into<String>,
        cidr: impl Into<String>,
    ) -> Self {
        let region = region.into();
        Self {
            id: Uuid::new_v4(),
            cloud_id: cloud_id.into(),
            zone: format!("{region}-1"),
            region,
            name: name.into(),
            status: ResourceStatus::CreationPending,
            provider_id: None,
            cidr: cidr.into(),
            vpc_name: vpc_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: Uuid,
    pub cloud_id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub vpc_name: String,
    pub rules: Vec<String>,
}

impl SecurityGroup {
    pub fn new(
        cloud_id: impl Into<String>,
        name: impl Into<String>,
        vpc_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cloud_id: cloud_id.into(),
            name: name.into(),
            status: ResourceStatus::CreationPending,
            provider_id: None,
            vpc_name: vpc_name.into(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAcl {
    pub id: Uuid,
    pub cloud_id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub vpc_name: String,
    pub rules: Vec<String>,
}

impl NetworkAcl {
    pub fn new(
        cloud_id: impl Into<String>,
        name: impl Into<String>,
        vpc_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cloud_id: cloud_id.into(),
            name: name.into(),
            status: ResourceStatus::CreationPending,
            provider_id: None,
            vpc_name: vpc_name.into(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: Uuid,
    pub cloud_id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub vpc_name: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnGateway {
    pub id: Uuid,
    pub cloud_id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub vpc_name: String,
    pub connections: Vec<VpnConnection>,
}

impl VpnGateway {
    pub fn new(
        cloud_id: impl Into<String>,
        name: impl Into<String>,
        vpc_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cloud_id: cloud_id.into(),
            name: name.into(),
            status: ResourceStatus::CreationPending,
            provider_id: None,
            vpc_name: vpc_name.into(),
            connections: Vec::new(),
        }
    }

    pub fn with_connection(mut self, connection: VpnConnection) -> Self {
        self.connections.push(connection);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnConnection {
    pub id: Uuid,
    pub cloud_id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub gateway_name: String,
    pub peer_address: String,
}

impl VpnConnection {
    pub fn new(
        cloud_id: impl Into<String>,
        name: impl Into<String>,
        gateway_name: impl Into<String>,
        peer_address: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cloud_id: cloud_id.into(),
            name: name.into(),
            status: ResourceStatus::Created,
            provider_id: None,
            gateway_name: gateway_name.into(),
            peer_address: peer_address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedicatedHost {
    pub id: Uuid,
    pub cloud_id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub zone: String,
    pub profile: String,
}

impl DedicatedHost {
    pub fn new(
        cloud_id: impl Into<String>,
        name: impl Into<String>,
        zone: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cloud_id: cloud_id.into(),
            name: name.into(),
            status: ResourceStatus::CreationPending,
            provider_id: None,
            zone: zone.into(),
            profile: profile.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubernetesCluster {
    pub id: Uuid,
    pub cloud_id: String,
    pub region: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
    pub worker_count: u32,
}

impl KubernetesCluster {
    pub fn new(
        cloud_id: impl Into<String>,
        region: impl Into<String>,
        name: impl Into<String>,
        worker_count: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cloud_id: cloud_id.into(),
            region: region.into(),
            name: name.into(),
            status: ResourceStatus::Created,
            provider_id: None,
            worker_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub id: Uuid,
    pub cloud_id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub provider_id: Option<String>,
}

impl_identity!(Vpc);
impl_identity!(Subnet);
impl_identity!(SecurityGroup);
impl_identity!(NetworkAcl);
impl_identity!(LoadBalancer);
impl_identity!(VpnGateway);
impl_identity!(VpnConnection);
impl_identity!(DedicatedHost);
impl_identity!(KubernetesCluster);
impl_identity!(ResourceGroup);

/// Supported cloud providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    Ibm,
    Gcp,
    Softlayer,
}

/// A cloud account/credential reference. Authentication failures mark the
/// account Invalid regardless of the resource being provisioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudAccount {
    pub id: String,
    pub name: String,
    pub provider: CloudProvider,
    pub status: AccountStatus,
}

impl CloudAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: CloudProvider) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider,
            status: AccountStatus::Valid,
        }
    }
}

/// Tagged union over the concrete resource kinds, the unit the registry
/// stores and the reconciliation helpers operate on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRecord {
    Vpc(Vpc),
    Subnet(Subnet),
    SecurityGroup(SecurityGroup),
    NetworkAcl(NetworkAcl),
    LoadBalancer(LoadBalancer),
    VpnGateway(VpnGateway),
    VpnConnection(VpnConnection),
    DedicatedHost(DedicatedHost),
    KubernetesCluster(KubernetesCluster),
    ResourceGroup(ResourceGroup),
}

macro_rules! delegate {
    ($self:ident, $r:ident => $body:expr) => {
        match $self {
            ResourceRecord::Vpc($r) => $body,
            ResourceRecord::Subnet($r) => $body,
            ResourceRecord::SecurityGroup($r) => $body,
            ResourceRecord::NetworkAcl($r) => $body,
            ResourceRecord::LoadBalancer($r) => $body,
            ResourceRecord::VpnGateway($r) => $body,
            ResourceRecord::VpnConnection($r) => $body,
            ResourceRecord::DedicatedHost($r) => $body,
            ResourceRecord::KubernetesCluster($r) => $body,
            ResourceRecord::ResourceGroup($r) => $body,
        }
    };
}

impl ResourceRecord {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Vpc(_) => ResourceKind::Vpc,
            Self::Subnet(_) => ResourceKind::Subnet,
            Self::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Self::NetworkAcl(_) => ResourceKind::NetworkAcl,
            Self::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Self::VpnGateway(_) => ResourceKind::VpnGateway,
            Self::VpnConnection(_) => ResourceKind::VpnConnection,
            Self::DedicatedHost(_) => ResourceKind::DedicatedHost,
            Self::KubernetesCluster(_) => ResourceKind::KubernetesCluster,
            Self::ResourceGroup(_) => ResourceKind::ResourceGroup,
        }
    }

    pub fn internal_id(&self) -> Uuid {
        delegate!(self, r => r.internal_id())
    }

    pub fn name(&self) -> &str {
        delegate!(self, r => r.name())
    }

    pub fn cloud_id(&self) -> &str {
        delegate!(self, r => r.cloud_id.as_str())
    }

    /// The registry row key for this record
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.cloud_id().to_string(), self.kind(), self.name().to_string())
    }

    pub fn status(&self) -> ResourceStatus {
        delegate!(self, r => r.status)
    }

    pub fn set_status(&mut self, status: ResourceStatus) {
        delegate!(self, r => r.status = status)
    }

    pub fn provider_id(&self) -> Option<&str> {
        delegate!(self, r => r.provider_id.as_deref())
    }

    pub fn set_provider_id(&mut self, provider_id: impl Into<String>) {
        let provider_id = provider_id.into();
        delegate!(self, r => r.provider_id = Some(provider_id.clone()))
    }

    /// Deep, detached clone for merge operations: all internal ids are
    /// re-minted so the copy never aliases registry rows.
    pub fn make_copy(&self) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Self::Vpc(vpc) => {
                vpc.id = Uuid::new_v4();
                for subnet in &mut vpc.subnets {
                    subnet.id = Uuid::new_v4();
                }
            }
            Self::VpnGateway(gateway) => {
                gateway.id = Uuid::new_v4();
                for connection in &mut gateway.connections {
                    connection.id = Uuid::new_v4();
                }
            }
            other => delegate!(other, r => r.set_internal_id(Uuid::new_v4())),
        }
        copy
    }

    /// Structural equality excluding internal ids (children included)
    pub fn params_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Vpc(a), Self::Vpc(b)) => {
                a.cloud_id == b.cloud_id
                    && a.region == b.region
                    && a.name == b.name
                    && a.status == b.status
                    && a.provider_id == b.provider_id
                    && a.address_prefixes == b.address_prefixes
                    && a.subnets.len() == b.subnets.len()
                    && a.subnets
                        .iter()
                        .zip(&b.subnets)
                        .all(|(x, y)| subnet_params_eq(x, y))
            }
            (Self::Subnet(a), Self::Subnet(b)) => subnet_params_eq(a, b),
            (Self::VpnGateway(a), Self::VpnGateway(b)) => {
                a.cloud_id == b.cloud_id
                    && a.name == b.name
                    && a.status == b.status
                    && a.provider_id == b.provider_id
                    && a.vpc_name == b.vpc_name
                    && a.connections.len() == b.connections.len()
                    && a.connections
                        .iter()
                        .zip(&b.connections)
                        .all(|(x, y)| connection_params_eq(x, y))
            }
            (Self::VpnConnection(a), Self::VpnConnection(b)) => connection_params_eq(a, b),
            (Self::SecurityGroup(a), Self::SecurityGroup(b)) => {
                strip_id(a.clone()) == strip_id(b.clone())
            }
            (Self::NetworkAcl(a), Self::NetworkAcl(b)) => {
                strip_id(a.clone()) == strip_id(b.clone())
            }
            (Self::LoadBalancer(a), Self::LoadBalancer(b)) => {
                strip_id(a.clone()) == strip_id(b.clone())
            }
            (Self::DedicatedHost(a), Self::DedicatedHost(b)) => {
                strip_id(a.clone()) == strip_id(b.clone())
            }
            (Self::KubernetesCluster(a), Self::KubernetesCluster(b)) => {
                strip_id(a.clone()) == strip_id(b.clone())
            }
            (Self::ResourceGroup(a), Self::ResourceGroup(b)) => {
                strip_id(a.clone()) == strip_id(b.clone())
            }
            _ => false,
        }
    }
}

fn subnet_params_eq(a: &Subnet, b: &Subnet) -> bool {
    a.cloud_id == b.cloud_id
        && a.region == b.region
        && a.zone == b.zone
        && a.name == b.name
        && a.status == b.status
        && a.provider_id == b.provider_id
        && a.cidr == b.cidr
        && a.vpc_name == b.vpc_name
}

fn connection_params_eq(a: &VpnConnection, b: &VpnConnection) -> bool {
    a.cloud_id == b.cloud_id
        && a.name == b.name
        && a.status == b.status
        && a.provider_id == b.provider_id
        && a.gateway_name == b.gateway_name
        && a.peer_address == b.peer_address
}

/// Normalize a leaf record for comparison by zeroing its internal id
fn strip_id<T: ResourceIdentity>(mut record: T) -> T {
    record.set_internal_id(Uuid::nil());
    record
}
