//! ID 预留行为测试。

use sensornet_registry::{Node, RegistryError, SensorRegistry};

#[test]
fn reserve_hands_out_lowest_free_ids_in_order() {
    let registry = SensorRegistry::new();
    assert_eq!(registry.reserve_id().expect("reserve"), 1);
    assert_eq!(registry.reserve_id().expect("reserve"), 2);
    assert_eq!(registry.reserve_id().expect("reserve"), 3);
    assert!(registry.contains(2).expect("contains"));
}

#[test]
fn reserve_reuses_gap_left_by_removed_node() {
    let registry = SensorRegistry::new();
    for _ in 0..4 {
        registry.reserve_id().expect("reserve");
    }
    assert!(registry.remove_node(3).expect("remove"));
    assert_eq!(registry.reserve_id().expect("reserve"), 3);
    assert_eq!(registry.reserve_id().expect("reserve"), 5);
}

#[test]
fn reserve_fails_when_range_exhausted() {
    let registry = SensorRegistry::new();
    for id in 1..=254 {
        registry
            .register(Node::new(id).expect("node"))
            .expect("register");
    }
    match registry.reserve_id() {
        Err(RegistryError::IdsExhausted) => {}
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[test]
fn reserved_node_is_registered_immediately() {
    let registry = SensorRegistry::new();
    let id = registry.reserve_id().expect("reserve");
    let node = registry.snapshot(id).expect("snapshot").expect("node");
    assert!(node.is_reachable());
    assert!(node.children().is_empty());
}

#[test]
fn broadcast_id_is_rejected() {
    match Node::new(255) {
        Err(RegistryError::InvalidNodeId(255)) => {}
        other => panic!("expected invalid id, got {other:?}"),
    }
}

#[test]
fn from_ids_restores_bare_nodes_and_skips_invalid() {
    let registry = SensorRegistry::from_ids(&[4, 1, 255, 9]);
    assert_eq!(registry.node_ids().expect("ids"), vec![1, 4, 9]);
}
