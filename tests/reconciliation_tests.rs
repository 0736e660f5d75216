//! Registry reconciliation contract: `make_copy`/`params_eq` and the
//! `add_update` idempotent upsert, including the name-matched child merge.

use proptest::prelude::*;
use vpcflow_core::models::{ResourceRecord, Subnet, Vpc, VpnConnection, VpnGateway};
use vpcflow_core::registry::ResourceRegistry;
use vpcflow_core::ResourceStatus;

fn vpc_with_subnets(name: &str, cidr_octets: &[u8]) -> ResourceRecord {
    let mut vpc = Vpc::new("cloud-r", "us-south", name);
    for (i, octet) in cidr_octets.iter().enumerate() {
        vpc = vpc.with_subnet(Subnet::new(
            "cloud-r",
            "us-south",
            format!("{name}-subnet-{i}"),
            name,
            format!("10.0.{octet}.0/24"),
        ));
    }
    ResourceRecord::Vpc(vpc)
}

#[test]
fn test_merge_preserves_surviving_connection_ids() {
    let registry = ResourceRegistry::new();
    let stored = registry.add_update(ResourceRecord::VpnGateway(
        VpnGateway::new("cloud-r", "gw-1", "vpc-1")
            .with_connection(VpnConnection::new("cloud-r", "conn-1", "gw-1", "198.51.100.4"))
            .with_connection(VpnConnection::new("cloud-r", "conn-2", "gw-1", "198.51.100.5")),
    ));
    let ResourceRecord::VpnGateway(gw) = &stored else {
        unreachable!()
    };
    let conn_1_id = gw.connections[0].id;

    // conn-2 vanishes, conn-3 arrives, conn-1 survives
    let mut incoming = stored.make_copy();
    if let ResourceRecord::VpnGateway(gw) = &mut incoming {
        gw.connections.remove(1);
        gw.connections
            .push(VpnConnection::new("cloud-r", "conn-3", "gw-1", "198.51.100.6"));
    }

    let merged = registry.add_update(incoming);
    let ResourceRecord::VpnGateway(gw) = &merged else {
        unreachable!()
    };
    assert_eq!(merged.internal_id(), stored.internal_id());
    assert_eq!(gw.connections.len(), 2);
    assert_eq!(gw.connections[0].name, "conn-1");
    assert_eq!(gw.connections[0].id, conn_1_id);
    assert_eq!(gw.connections[1].name, "conn-3");
}

#[test]
fn test_status_change_is_a_parameter_difference() {
    let registry = ResourceRegistry::new();
    let stored = registry.add_update(vpc_with_subnets("status-vpc", &[1]));

    let mut incoming = stored.make_copy();
    incoming.set_status(ResourceStatus::Created);

    let merged = registry.add_update(incoming);
    assert_eq!(merged.internal_id(), stored.internal_id());
    assert_eq!(merged.status(), ResourceStatus::Created);
}

proptest! {
    #[test]
    fn prop_make_copy_preserves_params(octets in prop::collection::vec(0u8..=254, 0..6)) {
        let record = vpc_with_subnets("prop-vpc", &octets);
        let copy = record.make_copy();
        prop_assert!(copy.params_eq(&record));
        prop_assert_ne!(copy.internal_id(), record.internal_id());
    }

    #[test]
    fn prop_add_update_never_moves_an_unchanged_row(
        octets in prop::collection::vec(0u8..=254, 0..6),
        repeats in 1usize..4,
    ) {
        let registry = ResourceRegistry::new();
        let stored = registry.add_update(vpc_with_subnets("prop-vpc", &octets));

        for _ in 0..repeats {
            let again = registry.add_update(stored.make_copy());
            prop_assert_eq!(again.internal_id(), stored.internal_id());
        }
        prop_assert_eq!(registry.get_existing(&stored.key()).unwrap(), stored);
    }

    #[test]
    fn prop_cidr_change_breaks_params_eq(
        a in 0u8..=127,
        b in 128u8..=254,
    ) {
        let record = vpc_with_subnets("prop-vpc", &[a]);
        let mut changed = record.make_copy();
        if let ResourceRecord::Vpc(vpc) = &mut changed {
            vpc.subnets[0].cidr = format!("10.0.{b}.0/24");
        }
        prop_assert!(!record.params_eq(&changed));
    }
}
