//! 线协议与 MQTT 编解码。
//!
//! 两种编码承载同一个 [`Message`]：
//! - 串口/TCP：ASCII 行 `node;child;type;ack;subtype;payload\n`
//! - MQTT：主题后缀 `node/child/type/ack/subtype`，payload 作为消息体

use crate::message::{Direction, Message, MessageType};

/// 编解码错误。
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// 字段数不足 6 个
    #[error("truncated message, expected 6 fields: {0:?}")]
    Truncated(String),

    /// 整数头部字段不可解析
    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// 未知消息类型编码
    #[error("unknown message type code: {0}")]
    UnknownType(u8),
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, CodecError> {
    value.trim().parse::<u8>().map_err(|_| CodecError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn assemble(
    node: &str,
    child: &str,
    msg_type: &str,
    ack: &str,
    subtype: &str,
    payload: &str,
) -> Result<Message, CodecError> {
    let type_code = parse_u8("type", msg_type)?;
    let msg_type = MessageType::from_code(type_code).ok_or(CodecError::UnknownType(type_code))?;

    Ok(Message {
        node_id: parse_u8("node", node)?,
        child_id: parse_u8("child", child)?,
        msg_type,
        ack: parse_u8("ack", ack)? != 0,
        subtype: parse_u8("subtype", subtype)?,
        payload: payload.to_string(),
        direction: Direction::Incoming,
        revert: false,
        smart_sleep: false,
    })
}

/// 解析一行线协议消息。
///
/// payload 取第 5 个分隔符之后的剩余部分，自身可以包含分号。
pub fn parse(line: &str) -> Result<Message, CodecError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.splitn(6, ';');

    let node = parts.next();
    let child = parts.next();
    let msg_type = parts.next();
    let ack = parts.next();
    let subtype = parts.next();
    let payload = parts.next();

    match (node, child, msg_type, ack, subtype, payload) {
        (Some(n), Some(c), Some(t), Some(a), Some(s), Some(p)) => assemble(n, c, t, a, s, p),
        _ => Err(CodecError::Truncated(line.to_string())),
    }
}

/// 序列化为一行线协议消息（含行终止符）。
pub fn serialize(msg: &Message) -> String {
    format!(
        "{};{};{};{};{};{}\n",
        msg.node_id,
        msg.child_id,
        msg.msg_type.code(),
        u8::from(msg.ack),
        msg.subtype,
        msg.payload
    )
}

/// 解析 MQTT 编码：主题后缀携带 5 个头部字段，payload 为消息体。
pub fn parse_mqtt(topic_suffix: &str, payload: &str) -> Result<Message, CodecError> {
    let mut parts = topic_suffix.trim_matches('/').splitn(5, '/');

    let node = parts.next();
    let child = parts.next();
    let msg_type = parts.next();
    let ack = parts.next();
    let subtype = parts.next();

    match (node, child, msg_type, ack, subtype) {
        (Some(n), Some(c), Some(t), Some(a), Some(s)) => assemble(n, c, t, a, s, payload),
        _ => Err(CodecError::Truncated(topic_suffix.to_string())),
    }
}

/// 生成 MQTT 发布主题后缀（不含前缀与 payload）。
pub fn mqtt_topic_suffix(msg: &Message) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        msg.node_id,
        msg.child_id,
        msg.msg_type.code(),
        u8::from(msg.ack),
        msg.subtype
    )
}
