//! End-to-end scenarios driving NhgSyncOrch against the in-memory switch.

use nhgorchd::config::NhgOrchConfig;
use nhgorchd::nhg::{ForwardingHandle, GroupId, GroupStatus};
use nhgorchd::orch::{
    NhgSyncOrch, CLASS_BASED_NEXT_HOP_GROUP_TABLE, LABEL_ROUTE_TABLE, NEXT_HOP_GROUP_TABLE,
    ROUTE_TABLE,
};
use nhgorchd::reactor::{LinkEvent, NeighborEvent};
use nhgorchd::replay::Replayer;
use nhgorchd::route::RouteKey;
use nhgorchd::NhgDaemon;
use pretty_assertions::assert_eq;
use sonic_orch_common::KeyOpFieldsValues;
use sonic_sai::{
    NextHopGroupOid, NextHopOid, NextHopSpec, RouteEntry, SaiStatus, VirtualOp, VirtualSwitch,
};
use sonic_types::{LabelStack, MplsLabel};
use std::sync::Arc;

struct Harness {
    switch: Arc<VirtualSwitch>,
    orch: NhgSyncOrch,
}

impl Harness {
    fn new(capacity: u32) -> Self {
        let switch = Arc::new(VirtualSwitch::new(capacity));
        let orch = NhgSyncOrch::new(switch.clone(), &NhgOrchConfig::default());
        Self { switch, orch }
    }

    /// Harness with 10.0.0.1@Ethernet0, 10.0.0.3@Ethernet4 and
    /// 10.0.0.5@Ethernet8 resolved.
    fn with_neighbors(capacity: u32) -> Self {
        let mut h = Self::new(capacity);
        h.neighbor("10.0.0.1", "Ethernet0");
        h.neighbor("10.0.0.3", "Ethernet4");
        h.neighbor("10.0.0.5", "Ethernet8");
        h
    }

    fn neighbor(&mut self, ip: &str, alias: &str) -> NextHopOid {
        let oid = self.switch.register_next_hop(NextHopSpec {
            ip: ip.parse().unwrap(),
            alias: alias.to_string(),
            labels: LabelStack::default(),
        });
        self.orch.on_neighbor_event(&NeighborEvent {
            ip: ip.parse().unwrap(),
            alias: alias.to_string(),
            next_hop: Some(oid.as_raw()),
        });
        oid
    }

    fn link(&mut self, alias: &str, up: bool) {
        self.orch.on_link_event(&LinkEvent {
            alias: alias.to_string(),
            up,
        });
    }

    fn set(&mut self, table: &str, key: &str, fields: &[(&str, &str)]) {
        self.orch
            .add_entries(table, vec![KeyOpFieldsValues::set_fields(key, fields)]);
        self.orch.process_pending();
    }

    fn del(&mut self, table: &str, key: &str) {
        self.orch
            .add_entries(table, vec![KeyOpFieldsValues::del(key)]);
        self.orch.process_pending();
    }

    fn group(&mut self, name: &str, nexthop: &str, ifname: &str) {
        self.set(
            NEXT_HOP_GROUP_TABLE,
            name,
            &[("nexthop", nexthop), ("ifname", ifname)],
        );
    }

    fn route_to_group(&mut self, prefix: &str, group: &str) {
        self.set(ROUTE_TABLE, prefix, &[("nexthop_group", group)]);
    }

    fn route_target(&self, prefix: &str) -> Option<u64> {
        self.switch
            .route_target(&RouteEntry::ip(prefix.parse().unwrap()))
    }

    fn hw_group(&self, id: &GroupId) -> NextHopGroupOid {
        match self.orch.group_handle(id) {
            Some(ForwardingHandle::Group(oid)) => oid,
            other => panic!("{} has no hardware group: {:?}", id, other),
        }
    }
}

fn named(name: &str) -> GroupId {
    GroupId::Named(name.to_string())
}

fn class_based(name: &str) -> GroupId {
    GroupId::ClassBased(name.to_string())
}

#[test]
fn test_link_flap_shrinks_and_restores_route_group() {
    let mut h = Harness::with_neighbors(16);
    h.set(
        ROUTE_TABLE,
        "2.2.2.0/24",
        &[
            ("nexthop", "10.0.0.1,10.0.0.3,10.0.0.5"),
            ("ifname", "Ethernet0,Ethernet4,Ethernet8"),
        ],
    );
    assert_eq!(h.switch.group_count(), 1);
    let oid = h.switch.groups()[0];
    assert_eq!(h.route_target("2.2.2.0/24"), Some(oid.as_raw()));
    assert_eq!(h.switch.group_members(oid).len(), 3);

    h.link("Ethernet4", false);
    assert_eq!(h.switch.group_members(oid).len(), 2);
    assert_eq!(h.route_target("2.2.2.0/24"), Some(oid.as_raw()));

    h.link("Ethernet4", true);
    assert_eq!(h.switch.group_members(oid).len(), 3);
    assert_eq!(h.route_target("2.2.2.0/24"), Some(oid.as_raw()));
    assert_eq!(h.switch.groups(), vec![oid]);
}

#[test]
fn test_capacity_ceiling_promotes_oldest_pending() {
    let mut h = Harness::with_neighbors(512);
    assert_eq!(h.orch.capacity().max(), 512);

    for i in 1..=513 {
        h.group(&format!("nhg{}", i), "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    }
    assert_eq!(h.switch.group_count(), 512);
    assert_eq!(h.orch.group_state(&named("nhg513")), Some(GroupStatus::Pending));
    assert_eq!(h.orch.capacity().pending_len(), 1);

    h.route_to_group("2.2.2.0/24", "nhg513");
    let stand_in = h.route_target("2.2.2.0/24").unwrap();
    assert!(!h.switch.is_group(stand_in));
    assert!(h.switch.next_hop_spec(stand_in).is_some());

    h.del(NEXT_HOP_GROUP_TABLE, "nhg1");
    assert_eq!(h.orch.group_state(&named("nhg1")), None);
    assert_eq!(h.orch.group_state(&named("nhg513")), Some(GroupStatus::Synced));
    assert_eq!(h.switch.group_count(), 512);
    let oid = h.hw_group(&named("nhg513"));
    assert_eq!(h.route_target("2.2.2.0/24"), Some(oid.as_raw()));
    assert_eq!(h.orch.stats().promotions, 1);
}

#[test]
fn test_pending_group_uses_one_stand_in() {
    let mut h = Harness::with_neighbors(1);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.group("nhg2", "10.0.0.3,10.0.0.5", "Ethernet4,Ethernet8");

    assert_eq!(h.orch.capacity().synced(), 1);
    assert_eq!(h.switch.group_count(), 1);
    let Some(ForwardingHandle::NextHop(stand_in)) = h.orch.group_handle(&named("nhg2")) else {
        panic!("pending group should resolve to a next hop");
    };
    let spec = h.switch.next_hop_spec(stand_in.as_raw()).unwrap();
    assert_eq!(spec.ip.to_string(), "10.0.0.3");
}

#[test]
fn test_identical_inline_routes_share_group() {
    let mut h = Harness::with_neighbors(16);
    h.set(
        ROUTE_TABLE,
        "2.2.2.0/24",
        &[("nexthop", "10.0.0.1,10.0.0.3"), ("ifname", "Ethernet0,Ethernet4")],
    );
    h.set(
        ROUTE_TABLE,
        "3.3.3.0/24",
        &[("nexthop", "10.0.0.3,10.0.0.1"), ("ifname", "Ethernet4,Ethernet0")],
    );

    assert_eq!(h.switch.group_count(), 1);
    let key = RouteKey::parse_prefix("2.2.2.0/24").unwrap();
    let id = h.orch.route_group(&key).cloned().unwrap();
    assert_eq!(h.orch.ref_count(&id), Some(2));
    assert_eq!(h.route_target("2.2.2.0/24"), h.route_target("3.3.3.0/24"));

    h.del(ROUTE_TABLE, "2.2.2.0/24");
    assert_eq!(h.orch.ref_count(&id), Some(1));
    h.del(ROUTE_TABLE, "3.3.3.0/24");
    assert_eq!(h.orch.ref_count(&id), None);
    assert_eq!(h.switch.group_count(), 0);
    assert_eq!(h.switch.route_count(), 0);
}

#[test]
fn test_member_order_does_not_matter() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3,10.0.0.5", "Ethernet0,Ethernet4,Ethernet8");
    h.group("nhg2", "10.0.0.5,10.0.0.1,10.0.0.3", "Ethernet8,Ethernet0,Ethernet4");

    let members = |h: &Harness, name: &str| {
        let mut next_hops: Vec<u64> = h
            .switch
            .group_members(h.hw_group(&named(name)))
            .iter()
            .map(|m| m.next_hop)
            .collect();
        next_hops.sort_unstable();
        next_hops
    };
    assert_eq!(members(&h, "nhg1"), members(&h, "nhg2"));
    assert_eq!(members(&h, "nhg1").len(), 3);
}

#[test]
fn test_referenced_delete_waits_for_last_referrer() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.route_to_group("2.2.2.0/24", "nhg1");

    h.del(NEXT_HOP_GROUP_TABLE, "nhg1");
    assert_eq!(h.orch.group_state(&named("nhg1")), Some(GroupStatus::Synced));
    assert!(h.orch.is_parked(NEXT_HOP_GROUP_TABLE, "nhg1"));
    assert_eq!(h.switch.group_count(), 1);
    assert_eq!(h.orch.stats().rejected_deletes, 1);

    h.del(ROUTE_TABLE, "2.2.2.0/24");
    assert_eq!(h.orch.group_state(&named("nhg1")), None);
    assert_eq!(h.orch.parked_count(), 0);
    assert_eq!(h.switch.group_count(), 0);
    assert_eq!(h.orch.capacity().synced(), 0);
}

#[test]
fn test_referenced_shrink_rejected_until_released() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.route_to_group("2.2.2.0/24", "nhg1");
    let oid = h.hw_group(&named("nhg1"));

    h.group("nhg1", "10.0.0.1", "Ethernet0");
    assert_eq!(h.orch.group_state(&named("nhg1")), Some(GroupStatus::Synced));
    assert_eq!(h.switch.group_members(oid).len(), 2);
    assert!(h.orch.is_parked(NEXT_HOP_GROUP_TABLE, "nhg1"));

    h.del(ROUTE_TABLE, "2.2.2.0/24");
    assert_eq!(h.orch.group_state(&named("nhg1")), Some(GroupStatus::SingleNh));
    assert_eq!(h.switch.group_count(), 0);
}

#[test]
fn test_referenced_update_to_unresolved_member_rejected() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.route_to_group("2.2.2.0/24", "nhg1");
    let oid = h.hw_group(&named("nhg1"));

    h.group("nhg1", "10.0.0.1,10.0.0.9", "Ethernet0,Ethernet12");
    assert_eq!(h.orch.group_state(&named("nhg1")), Some(GroupStatus::Synced));
    assert_eq!(h.switch.group_members(oid).len(), 2);
    assert_eq!(h.route_target("2.2.2.0/24"), Some(oid.as_raw()));
    assert!(h.orch.is_parked(NEXT_HOP_GROUP_TABLE, "nhg1"));
    assert_eq!(h.orch.stats().rejected_resizes, 1);
}

#[test]
fn test_newer_group_update_replaces_parked_delete() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.route_to_group("2.2.2.0/24", "nhg1");
    h.del(NEXT_HOP_GROUP_TABLE, "nhg1");
    assert!(h.orch.is_parked(NEXT_HOP_GROUP_TABLE, "nhg1"));

    h.group("nhg1", "10.0.0.1,10.0.0.3,10.0.0.5", "Ethernet0,Ethernet4,Ethernet8");
    assert_eq!(h.orch.parked_count(), 0);

    h.del(ROUTE_TABLE, "2.2.2.0/24");
    assert_eq!(h.orch.group_state(&named("nhg1")), Some(GroupStatus::Synced));
    assert_eq!(h.switch.member_count(), 3);
}

#[test]
fn test_class_based_group_class_map_update() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.group("nhg2", "10.0.0.5", "Ethernet8");
    h.set(
        CLASS_BASED_NEXT_HOP_GROUP_TABLE,
        "cbf1",
        &[
            ("members", "nhg1,nhg2"),
            ("class_map", "0:0,1:0,2:0,3:0,4:1,5:1,6:1,7:1"),
        ],
    );

    let oid = h.hw_group(&class_based("cbf1"));
    let map = h.switch.class_map(oid).unwrap();
    for fc in 0..4 {
        assert_eq!(map.get(&fc), Some(&0));
    }
    for fc in 4..8 {
        assert_eq!(map.get(&fc), Some(&1));
    }
    let members = h.switch.group_members(oid);
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].next_hop, h.hw_group(&named("nhg1")).as_raw());
    assert_eq!(h.orch.ref_count(&named("nhg1")), Some(1));

    h.set(
        CLASS_BASED_NEXT_HOP_GROUP_TABLE,
        "cbf1",
        &[("members", "nhg1,nhg2"), ("class_map", "0:1,1:1,2:1,3:1,4:0,5:0,6:0,7:0")],
    );
    assert_eq!(h.switch.group_members(oid), members);
    assert_eq!(h.switch.class_map(oid).unwrap().get(&0), Some(&1));

    // Invalid maps leave the configuration alone
    for class_map in ["0:0,0:1", "64:0", "0:2", ""] {
        h.set(
            CLASS_BASED_NEXT_HOP_GROUP_TABLE,
            "cbf1",
            &[("members", "nhg1,nhg2"), ("class_map", class_map)],
        );
    }
    assert_eq!(h.switch.class_map(oid).unwrap().get(&0), Some(&1));
    assert_eq!(h.switch.group_members(oid), members);
    assert_eq!(h.orch.stats().intents.dropped, 4);
}

#[test]
fn test_group_names_shared_across_tables_dropped() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.group("nhg2", "10.0.0.5", "Ethernet8");
    h.set(
        CLASS_BASED_NEXT_HOP_GROUP_TABLE,
        "nhg1",
        &[("members", "nhg2"), ("class_map", "0:0")],
    );
    assert_eq!(h.orch.group_state(&class_based("nhg1")), None);
    assert!(!h.orch.is_parked(CLASS_BASED_NEXT_HOP_GROUP_TABLE, "nhg1"));

    h.set(
        CLASS_BASED_NEXT_HOP_GROUP_TABLE,
        "cbf1",
        &[("members", "nhg2"), ("class_map", "0:0")],
    );
    h.group("cbf1", "10.0.0.1", "Ethernet0");
    assert_eq!(h.orch.group_state(&named("cbf1")), None);
    assert_eq!(h.orch.stats().intents.dropped, 2);

    h.route_to_group("2.2.2.0/24", "nhg1");
    assert_eq!(
        h.route_target("2.2.2.0/24"),
        Some(h.hw_group(&named("nhg1")).as_raw())
    );
}

#[test]
fn test_class_based_group_follows_member_handles() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.set(
        CLASS_BASED_NEXT_HOP_GROUP_TABLE,
        "cbf1",
        &[("members", "nhg1"), ("class_map", "0:0")],
    );
    let oid = h.hw_group(&class_based("cbf1"));

    // nhg1 drops to a single next hop; the CBF member follows it
    h.link("Ethernet4", false);
    assert_eq!(h.orch.group_state(&named("nhg1")), Some(GroupStatus::SingleNh));
    let Some(ForwardingHandle::NextHop(nh)) = h.orch.group_handle(&named("nhg1")) else {
        panic!("expected a next hop handle");
    };
    assert_eq!(h.switch.group_members(oid)[0].next_hop, nh.as_raw());
    assert_eq!(h.switch.group_count(), 1);

    h.link("Ethernet4", true);
    let nhg1 = h.hw_group(&named("nhg1"));
    assert_eq!(h.switch.group_members(oid)[0].next_hop, nhg1.as_raw());
}

#[test]
fn test_refused_group_removal_retried_on_heartbeat() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.group("nhg2", "10.0.0.3,10.0.0.5", "Ethernet4,Ethernet8");
    h.set(
        CLASS_BASED_NEXT_HOP_GROUP_TABLE,
        "cbf1",
        &[("members", "nhg1,nhg2"), ("class_map", "0:0,1:1")],
    );
    let cbf1 = h.hw_group(&class_based("cbf1"));
    let nhg1 = h.hw_group(&named("nhg1"));
    assert_eq!(h.switch.group_count(), 3);

    // cbf1 cannot follow nhg1 down to a single next hop, so the switch
    // refuses to remove nhg1's group while cbf1 still points at it
    h.switch
        .inject_failure(VirtualOp::SetMemberNextHop, SaiStatus::Failure);
    h.link("Ethernet0", false);
    assert_eq!(h.orch.group_state(&named("nhg1")), Some(GroupStatus::SingleNh));
    assert_eq!(h.switch.group_members(cbf1)[0].next_hop, nhg1.as_raw());
    assert_eq!(h.switch.group_count(), 3);
    assert_eq!(h.orch.capacity().synced(), 3);

    h.orch.on_heartbeat();
    let Some(ForwardingHandle::NextHop(nh)) = h.orch.group_handle(&named("nhg1")) else {
        panic!("expected a next hop handle");
    };
    assert_eq!(h.switch.group_members(cbf1)[0].next_hop, nh.as_raw());
    assert_eq!(h.switch.group_count(), 2);
    assert_eq!(h.orch.capacity().synced(), 2);
    assert!(!h.orch.store().has_retired());
}

#[test]
fn test_class_based_group_waits_for_members_and_capacity() {
    let mut h = Harness::with_neighbors(1);
    h.set(
        CLASS_BASED_NEXT_HOP_GROUP_TABLE,
        "cbf1",
        &[("members", "nhg1"), ("class_map", "0:0")],
    );
    assert!(h.orch.is_parked(CLASS_BASED_NEXT_HOP_GROUP_TABLE, "cbf1"));

    h.group("nhg2", "10.0.0.3,10.0.0.5", "Ethernet4,Ethernet8");
    h.group("nhg1", "10.0.0.1", "Ethernet0");
    assert_eq!(h.orch.group_state(&class_based("cbf1")), Some(GroupStatus::Pending));
    assert_eq!(h.orch.group_handle(&class_based("cbf1")), None);

    h.route_to_group("2.2.2.0/24", "cbf1");
    assert_eq!(h.route_target("2.2.2.0/24"), None);

    h.del(NEXT_HOP_GROUP_TABLE, "nhg2");
    let oid = h.hw_group(&class_based("cbf1"));
    assert_eq!(h.route_target("2.2.2.0/24"), Some(oid.as_raw()));
    assert_eq!(h.switch.group_count(), 1);
}

#[test]
fn test_label_route_binds_like_prefix_route() {
    let mut h = Harness::with_neighbors(16);
    h.group("nhg1", "10.0.0.1,10.0.0.3", "Ethernet0,Ethernet4");
    h.set(LABEL_ROUTE_TABLE, "20", &[("nexthop_group", "nhg1")]);

    let entry = RouteEntry::inseg(MplsLabel::new(20).unwrap());
    let oid = h.hw_group(&named("nhg1"));
    assert_eq!(h.switch.route_target(&entry), Some(oid.as_raw()));
    assert_eq!(h.orch.ref_count(&named("nhg1")), Some(1));

    h.del(LABEL_ROUTE_TABLE, "20");
    assert_eq!(h.switch.route_target(&entry), None);
    assert_eq!(h.orch.ref_count(&named("nhg1")), Some(0));
}

#[test]
fn test_labeled_next_hops_created_on_demand() {
    let mut h = Harness::with_neighbors(16);
    h.group(
        "nhg1",
        "100+10.0.0.1,200/300+10.0.0.1",
        "Ethernet0,Ethernet0",
    );
    assert_eq!(h.orch.group_state(&named("nhg1")), Some(GroupStatus::Synced));
    assert_eq!(h.switch.next_hop_count(), 5);

    let oid = h.hw_group(&named("nhg1"));
    let labels: Vec<String> = h
        .switch
        .group_members(oid)
        .iter()
        .map(|m| h.switch.next_hop_spec(m.next_hop).unwrap().labels.to_string())
        .collect();
    assert_eq!(labels, vec!["100".to_string(), "200/300".to_string()]);

    h.del(NEXT_HOP_GROUP_TABLE, "nhg1");
    assert_eq!(h.switch.group_count(), 0);
    assert_eq!(h.switch.next_hop_count(), 3);
}

#[test]
fn test_unreachable_inline_route_is_armed_by_neighbors() {
    let mut h = Harness::new(16);
    h.set(
        ROUTE_TABLE,
        "Vrf-red:2.2.2.0/24",
        &[("nexthop", "10.0.0.1,10.0.0.3"), ("ifname", "Ethernet0,Ethernet4")],
    );
    let entry = RouteEntry::Ip {
        vrf: Some("Vrf-red".to_string()),
        destination: "2.2.2.0/24".parse().unwrap(),
    };
    assert_eq!(h.switch.route_target(&entry), None);

    let first = h.neighbor("10.0.0.1", "Ethernet0");
    assert_eq!(h.switch.route_target(&entry), Some(first.as_raw()));

    h.neighbor("10.0.0.3", "Ethernet4");
    let target = h.switch.route_target(&entry).unwrap();
    assert!(h.switch.is_group(target));
    assert_eq!(h.switch.member_count(), 2);
}

#[test]
fn test_weighted_members() {
    let mut h = Harness::with_neighbors(16);
    h.set(
        NEXT_HOP_GROUP_TABLE,
        "nhg1",
        &[
            ("nexthop", "10.0.0.1,10.0.0.3"),
            ("ifname", "Ethernet0,Ethernet4"),
            ("weight", "3,5"),
        ],
    );
    let oid = h.hw_group(&named("nhg1"));
    let weights: Vec<u32> = h.switch.group_members(oid).iter().map(|m| m.weight).collect();
    assert_eq!(weights, vec![3, 5]);

    h.set(
        NEXT_HOP_GROUP_TABLE,
        "nhg1",
        &[
            ("nexthop", "10.0.0.1,10.0.0.3"),
            ("ifname", "Ethernet0,Ethernet4"),
            ("weight", "3,256"),
        ],
    );
    let weights: Vec<u32> = h.switch.group_members(oid).iter().map(|m| m.weight).collect();
    assert_eq!(weights, vec![3, 5]);
}

#[tokio::test]
async fn test_replay_through_daemon() {
    let switch = Arc::new(VirtualSwitch::new(8));
    let config = NhgOrchConfig::default();
    let (daemon, sender) = NhgDaemon::new(&config, NhgSyncOrch::new(switch.clone(), &config));
    let handle = tokio::spawn(daemon.run());

    let replay = r#"
{"type":"table","table":"ROUTE_TABLE","key":"2.2.2.0/24","op":"SET","fields":{"nexthop_group":"nhg1"}}
{"type":"table","table":"NEXT_HOP_GROUP_TABLE","key":"nhg1","op":"SET","fields":{"nexthop":"10.0.0.1,10.0.0.3","ifname":"Ethernet0,Ethernet4"}}
{"type":"neighbor","ip":"10.0.0.1","alias":"Ethernet0","reachable":true}
{"type":"neighbor","ip":"10.0.0.3","alias":"Ethernet4","reachable":true}
{"type":"link","alias":"Ethernet4","up":false}
"#;
    for intent in Replayer::new(switch.clone()).parse(replay).unwrap() {
        sender.send(intent).await.unwrap();
    }
    drop(sender);

    let stats = handle.await.unwrap();
    assert_eq!(stats.routes, 1);
    assert_eq!(stats.groups, 1);
    assert_eq!(stats.synced_groups, 0);
    assert_eq!(switch.group_count(), 0);
    let target = switch
        .route_target(&RouteEntry::ip("2.2.2.0/24".parse().unwrap()))
        .unwrap();
    assert_eq!(
        switch.next_hop_spec(target).map(|s| s.ip.to_string()),
        Some("10.0.0.1".to_string())
    );
}
