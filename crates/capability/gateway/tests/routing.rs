//! 入站/出站消息路由测试。

mod common;

use common::{harness, read_line};
use domain::{Message, MessageType, PresentationCode, VariableKind};
use sensornet_gateway::GatewayEvent;

const TEMP: u8 = 0; // V_TEMP

#[tokio::test]
async fn incoming_set_updates_variable_and_emits_exactly_one_update() {
    let h = harness().await;
    h.gateway
        .registry()
        .present_child(2, 1, PresentationCode::Temp)
        .expect("present");

    let msg = domain::parse("2;1;1;0;0;25").expect("parse");
    h.gateway.handle_incoming(msg).await;

    assert_eq!(
        h.gateway.variable(2, 1, TEMP).expect("variable").as_deref(),
        Some("25")
    );
    assert_eq!(
        h.listener
            .count(|e| matches!(e, GatewayEvent::VariableUpdated { node_id: 2, child_id: 1, subtype: 0 }))
            .await,
        1
    );
}

#[tokio::test]
async fn req_replies_current_value_defaulting_to_zero() {
    let mut h = harness().await;
    h.gateway
        .registry()
        .present_child(2, 1, PresentationCode::Temp)
        .expect("present");

    let req = domain::parse("2;1;2;0;0;").expect("parse");
    h.gateway.handle_incoming(req.clone()).await;
    assert_eq!(read_line(&mut h.peer_read).await, "2;1;1;0;0;0");

    h.gateway
        .registry()
        .set_variable_value(2, 1, TEMP, "21.5")
        .expect("set");
    h.gateway.handle_incoming(req).await;
    assert_eq!(read_line(&mut h.peer_read).await, "2;1;1;0;0;21.5");
}

#[tokio::test]
async fn incoming_traffic_flips_unreachable_node_back() {
    let h = harness().await;
    h.gateway
        .registry()
        .present_child(2, 1, PresentationCode::Temp)
        .expect("present");
    h.gateway
        .registry()
        .set_reachable(2, false)
        .expect("set reachable");

    let msg = domain::parse("2;1;1;0;0;25").expect("parse");
    h.gateway.handle_incoming(msg).await;

    assert!(h.gateway.registry().is_reachable(2).expect("reachable"));
    assert_eq!(
        h.listener
            .count(|e| matches!(e, GatewayEvent::NodeReachability { node_id: 2, reachable: true }))
            .await,
        1
    );
    // 刷新发生在解释之前，这条 SET 本身也已生效
    assert_eq!(
        h.gateway.variable(2, 1, TEMP).expect("variable").as_deref(),
        Some("25")
    );
}

#[tokio::test]
async fn set_from_unknown_node_registers_bare_node_and_drops_the_write() {
    let h = harness().await;

    let msg = domain::parse("9;4;1;0;0;5").expect("parse");
    h.gateway.handle_incoming(msg).await;

    let registry = h.gateway.registry();
    assert!(registry.contains(9).expect("contains"));
    assert!(!registry.child_exists(9, 4).expect("child"));
    assert_eq!(
        h.listener
            .count(|e| matches!(e, GatewayEvent::NodeDiscovered { node_id: 9, child_id: None }))
            .await,
        1
    );
    assert_eq!(
        h.listener
            .count(|e| matches!(e, GatewayEvent::VariableUpdated { .. }))
            .await,
        0
    );
}

#[tokio::test]
async fn presentation_creates_child_and_unknown_code_is_ignored() {
    let h = harness().await;

    let msg = domain::parse("3;1;0;0;6;").expect("parse"); // S_TEMP
    h.gateway.handle_incoming(msg).await;
    assert!(h.gateway.registry().child_exists(3, 1).expect("child"));
    assert_eq!(
        h.listener
            .count(|e| matches!(e, GatewayEvent::NodeDiscovered { node_id: 3, child_id: Some(1) }))
            .await,
        1
    );

    let msg = domain::parse("3;2;0;0;99;").expect("parse"); // 未知类别
    h.gateway.handle_incoming(msg).await;
    assert!(!h.gateway.registry().child_exists(3, 2).expect("child"));
}

#[tokio::test]
async fn battery_update_is_stored_and_announced() {
    let h = harness().await;
    h.gateway
        .registry()
        .present_child(4, 0, PresentationCode::Temp)
        .expect("present");

    let msg = domain::parse("4;255;3;0;0;87").expect("parse");
    h.gateway.handle_incoming(msg).await;

    let node = h
        .gateway
        .registry()
        .snapshot(4)
        .expect("snapshot")
        .expect("node");
    assert_eq!(node.battery_percent(), 87);
    assert_eq!(
        h.listener
            .count(|e| matches!(e, GatewayEvent::BatteryUpdated { node_id: 4, percent: 87 }))
            .await,
        1
    );
}

#[tokio::test]
async fn config_request_is_answered_with_unit_system() {
    let mut h = harness().await;

    let msg = domain::parse("6;255;3;0;6;").expect("parse");
    h.gateway.handle_incoming(msg).await;

    assert_eq!(read_line(&mut h.peer_read).await, "6;255;3;0;6;M");
}

#[tokio::test]
async fn outgoing_set_to_unreachable_node_is_still_sent_without_recording() {
    let mut h = harness().await;
    let registry = h.gateway.registry();
    registry
        .present_child(2, 1, PresentationCode::Temp)
        .expect("present");
    registry
        .set_variable_value(2, 1, TEMP, "18")
        .expect("set");
    registry.set_reachable(2, false).expect("set reachable");

    h.gateway
        .set_variable(2, 1, VariableKind::Temp, "30")
        .await
        .expect("set variable");

    assert_eq!(read_line(&mut h.peer_read).await, "2;1;1;0;0;30");
    // 状态未入库
    assert_eq!(
        h.gateway.variable(2, 1, TEMP).expect("variable").as_deref(),
        Some("18")
    );
}

#[tokio::test]
async fn missing_ack_reverts_the_variable_once() {
    let mut h = harness().await;
    h.gateway
        .registry()
        .present_child(2, 1, PresentationCode::Temp)
        .expect("present");

    h.gateway
        .set_variable(2, 1, VariableKind::Temp, "20")
        .await
        .expect("set");
    assert_eq!(read_line(&mut h.peer_read).await, "2;1;1;0;0;20");
    h.gateway
        .set_variable(2, 1, VariableKind::Temp, "25")
        .await
        .expect("set");
    assert_eq!(read_line(&mut h.peer_read).await, "2;1;1;0;0;25");

    // 回退只看是否存在先前状态，不看消息上的任何标志
    let unacked = Message::outgoing(2, 1, MessageType::Set, false, TEMP, "25");
    h.gateway.handle_ack_not_received(&unacked).await;

    assert_eq!(
        h.gateway.variable(2, 1, TEMP).expect("variable").as_deref(),
        Some("20")
    );
    assert_eq!(
        h.listener
            .count(|e| matches!(e, GatewayEvent::VariableReverted { node_id: 2, child_id: 1, subtype: 0 }))
            .await,
        1
    );
}

#[tokio::test]
async fn missing_ack_on_req_also_reverts() {
    let mut h = harness().await;
    h.gateway
        .registry()
        .present_child(2, 1, PresentationCode::Temp)
        .expect("present");

    h.gateway
        .set_variable(2, 1, VariableKind::Temp, "20")
        .await
        .expect("set");
    assert_eq!(read_line(&mut h.peer_read).await, "2;1;1;0;0;20");
    h.gateway
        .set_variable(2, 1, VariableKind::Temp, "25")
        .await
        .expect("set");
    assert_eq!(read_line(&mut h.peer_read).await, "2;1;1;0;0;25");

    let unacked = Message::outgoing(2, 1, MessageType::Req, false, TEMP, "");
    h.gateway.handle_ack_not_received(&unacked).await;

    assert_eq!(
        h.gateway.variable(2, 1, TEMP).expect("variable").as_deref(),
        Some("20")
    );
}

#[tokio::test]
async fn time_request_is_answered_with_epoch_seconds() {
    let mut h = harness().await;

    let msg = domain::parse("7;255;3;0;1;").expect("parse");
    h.gateway.handle_incoming(msg).await;

    let reply = read_line(&mut h.peer_read).await;
    let payload = reply
        .strip_prefix("7;255;3;0;1;")
        .expect("time reply header");
    let epoch = payload.parse::<i64>().expect("epoch seconds");
    // epoch 秒量级（2020 年之后），而非毫秒
    assert!(epoch > 1_577_836_800);
    assert!(epoch < 10_000_000_000);
}
