use domain::message::{Direction, Message, MessageType};
use domain::types::{InternalSubtype, PresentationCode, VariableKind};
use domain::{mqtt_topic_suffix, parse, parse_mqtt, serialize, CodecError};

fn sample(payload: &str) -> Message {
    Message {
        node_id: 42,
        child_id: 3,
        msg_type: MessageType::Set,
        ack: true,
        subtype: VariableKind::Temp.code(),
        payload: payload.to_string(),
        direction: Direction::Incoming,
        revert: false,
        smart_sleep: false,
    }
}

#[test]
fn parse_well_formed_line() {
    let msg = parse("2;1;1;0;0;25\n").expect("parse");
    assert_eq!(msg.node_id, 2);
    assert_eq!(msg.child_id, 1);
    assert_eq!(msg.msg_type, MessageType::Set);
    assert!(!msg.ack);
    assert_eq!(msg.subtype, 0);
    assert_eq!(msg.payload, "25");
    assert_eq!(msg.direction, Direction::Incoming);
}

#[test]
fn parse_keeps_semicolons_in_payload() {
    let msg = parse("1;0;1;0;47;a;b;c").expect("parse");
    assert_eq!(msg.payload, "a;b;c");
}

#[test]
fn parse_empty_payload() {
    let msg = parse("5;255;3;0;3;").expect("parse");
    assert!(msg.is_internal(InternalSubtype::IdRequest));
    assert_eq!(msg.payload, "");
}

#[test]
fn parse_rejects_truncated_line() {
    match parse("1;2;3;0") {
        Err(CodecError::Truncated(_)) => {}
        other => panic!("expected Truncated, got {:?}", other),
    }
}

#[test]
fn parse_rejects_non_numeric_header() {
    match parse("one;2;1;0;0;x") {
        Err(CodecError::InvalidField { field: "node", .. }) => {}
        other => panic!("expected InvalidField, got {:?}", other),
    }
}

#[test]
fn parse_rejects_unknown_type() {
    match parse("1;2;9;0;0;x") {
        Err(CodecError::UnknownType(9)) => {}
        other => panic!("expected UnknownType, got {:?}", other),
    }
}

#[test]
fn line_round_trip() {
    let msg = sample("21.5");
    let again = parse(&serialize(&msg)).expect("round trip");
    assert_eq!(again, msg);
}

#[test]
fn line_round_trip_with_semicolons() {
    let msg = sample("a;b;;c");
    let again = parse(&serialize(&msg)).expect("round trip");
    assert_eq!(again, msg);
}

#[test]
fn mqtt_round_trip() {
    let msg = sample("21.5");
    let topic = mqtt_topic_suffix(&msg);
    assert_eq!(topic, "42/3/1/1/0");
    let again = parse_mqtt(&topic, &msg.payload).expect("round trip");
    assert_eq!(again, msg);
}

#[test]
fn mqtt_and_line_encodings_agree() {
    let from_line = parse("7;2;1;0;17;230").expect("line");
    let from_mqtt = parse_mqtt("7/2/1/0/17", "230").expect("mqtt");
    assert_eq!(from_line, from_mqtt);
}

#[test]
fn mqtt_rejects_short_topic() {
    assert!(parse_mqtt("7/2/1", "x").is_err());
}

#[test]
fn presentation_table_is_closed() {
    assert!(PresentationCode::from_code(40).is_none());
    assert_eq!(PresentationCode::from_code(13), Some(PresentationCode::Power));
    assert!(PresentationCode::Power
        .variables()
        .contains(&VariableKind::Watt));
    assert!(PresentationCode::ArduinoNode.variables().is_empty());
}

#[test]
fn version_probe_shape() {
    let probe = Message::version_probe();
    assert_eq!(serialize(&probe), "0;0;3;0;2;\n");
}
