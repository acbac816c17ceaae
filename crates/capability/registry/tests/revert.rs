//! 变量回退行为测试。

use domain::{PresentationCode, VariableKind};
use sensornet_registry::{RegistryError, SensorRegistry};

const TEMP: u8 = 0; // V_TEMP

fn registry_with_temp_sensor() -> SensorRegistry {
    let registry = SensorRegistry::new();
    registry
        .present_child(10, 1, PresentationCode::Temp)
        .expect("present");
    registry
}

#[test]
fn never_set_variable_is_not_revertible() {
    let registry = registry_with_temp_sensor();
    assert!(!registry.is_revertible(10, 1, TEMP).expect("revertible"));
    match registry.revert_variable(10, 1, TEMP) {
        Err(RegistryError::NotRevertible) => {}
        other => panic!("expected not revertible, got {other:?}"),
    }
}

#[test]
fn first_set_leaves_nothing_to_revert_to() {
    let registry = registry_with_temp_sensor();
    registry
        .set_variable_value(10, 1, TEMP, "21.5")
        .expect("set");
    assert!(!registry.is_revertible(10, 1, TEMP).expect("revertible"));
}

#[test]
fn revert_restores_previous_value_once() {
    let registry = registry_with_temp_sensor();
    registry
        .set_variable_value(10, 1, TEMP, "21.5")
        .expect("set");
    registry
        .set_variable_value(10, 1, TEMP, "99.9")
        .expect("set");
    assert!(registry.is_revertible(10, 1, TEMP).expect("revertible"));

    let restored = registry.revert_variable(10, 1, TEMP).expect("revert");
    assert_eq!(restored.as_deref(), Some("21.5"));
    assert_eq!(
        registry.variable_value(10, 1, TEMP).expect("value").as_deref(),
        Some("21.5")
    );

    // 单级撤销：回退之后历史即被清空
    match registry.revert_variable(10, 1, TEMP) {
        Err(RegistryError::NotRevertible) => {}
        other => panic!("expected not revertible, got {other:?}"),
    }
}

#[test]
fn outgoing_set_carries_child_config_flags() {
    let registry = registry_with_temp_sensor();
    let msg = registry
        .update_variable_state(10, 1, VariableKind::Temp, "22.0")
        .expect("build set");
    assert_eq!(msg.node_id, 10);
    assert_eq!(msg.child_id, 1);
    assert!(msg.is_set());
    assert!(!msg.ack);
    assert!(msg.revert);
    assert_eq!(msg.payload, "22.0");
}

#[test]
fn update_variable_state_records_value_and_arms_revert() {
    let registry = registry_with_temp_sensor();
    registry
        .update_variable_state(10, 1, VariableKind::Temp, "20.0")
        .expect("build set");
    registry
        .update_variable_state(10, 1, VariableKind::Temp, "21.0")
        .expect("build set");
    assert_eq!(
        registry.variable_value(10, 1, TEMP).expect("value").as_deref(),
        Some("21.0")
    );
    let restored = registry.revert_variable(10, 1, TEMP).expect("revert");
    assert_eq!(restored.as_deref(), Some("20.0"));
}

#[test]
fn unreachable_node_update_skips_the_write_but_builds_the_message() {
    let registry = registry_with_temp_sensor();
    registry
        .set_variable_value(10, 1, TEMP, "18.0")
        .expect("set");
    registry.set_reachable(10, false).expect("set reachable");

    let msg = registry
        .update_variable_state(10, 1, VariableKind::Temp, "25.0")
        .expect("build set");
    assert_eq!(msg.payload, "25.0");
    // 状态未入库
    assert_eq!(
        registry.variable_value(10, 1, TEMP).expect("value").as_deref(),
        Some("18.0")
    );
}

#[test]
fn unknown_variable_slot_is_rejected() {
    let registry = registry_with_temp_sensor();
    match registry.update_variable_state(10, 1, VariableKind::Rgb, "ff0000") {
        Err(RegistryError::UnknownVariable { subtype, .. }) => {
            assert_eq!(subtype, VariableKind::Rgb.code());
        }
        other => panic!("expected unknown variable, got {other:?}"),
    }
}
