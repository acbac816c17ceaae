//! 线协议消息模型。
//!
//! 一条消息由 6 个字段组成（node;child;type;ack;subtype;payload），
//! 前 5 个字段为整数头部，payload 为任意字符串（可含分号）。

use crate::types::InternalSubtype;

/// 网关自身的保留节点 ID。
pub const NODE_ID_GATEWAY: u8 = 0;
/// 广播地址，亦用于尚未分配 ID 的节点。
pub const NODE_ID_BROADCAST: u8 = 255;
/// 子设备广播地址。
pub const CHILD_ID_BROADCAST: u8 = 255;

/// 消息类型（线协议第 3 字段）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Presentation = 0,
    Set = 1,
    Req = 2,
    Internal = 3,
    Stream = 4,
}

impl MessageType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Presentation),
            1 => Some(Self::Set),
            2 => Some(Self::Req),
            3 => Some(Self::Internal),
            4 => Some(Self::Stream),
            _ => None,
        }
    }
}

/// 消息方向。不会出现在线协议上，由构造路径决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// 线协议消息。
///
/// `revert` 与 `smart_sleep` 仅在出站路径上有意义：前者标记该 SET
/// 在未收到 ack 时允许回退，后者标记目标节点为 smart-sleep 设备。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub node_id: u8,
    pub child_id: u8,
    pub msg_type: MessageType,
    pub ack: bool,
    pub subtype: u8,
    pub payload: String,
    pub direction: Direction,
    pub revert: bool,
    pub smart_sleep: bool,
}

impl Message {
    /// 构造一条出站消息。
    pub fn outgoing(
        node_id: u8,
        child_id: u8,
        msg_type: MessageType,
        ack: bool,
        subtype: u8,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            node_id,
            child_id,
            msg_type,
            ack,
            subtype,
            payload: payload.into(),
            direction: Direction::Outgoing,
            revert: false,
            smart_sleep: false,
        }
    }

    /// 链路健康巡检使用的版本探测消息。
    pub fn version_probe() -> Self {
        Self::outgoing(
            NODE_ID_GATEWAY,
            NODE_ID_GATEWAY,
            MessageType::Internal,
            false,
            InternalSubtype::Version.code(),
            "",
        )
    }

    /// 对指定节点的心跳请求。
    pub fn heartbeat_request(node_id: u8) -> Self {
        Self::outgoing(
            node_id,
            CHILD_ID_BROADCAST,
            MessageType::Internal,
            false,
            InternalSubtype::HeartbeatRequest.code(),
            "",
        )
    }

    /// ID 预留完成后的应答（发往广播地址）。
    pub fn id_response(new_id: u8) -> Self {
        Self::outgoing(
            NODE_ID_BROADCAST,
            CHILD_ID_BROADCAST,
            MessageType::Internal,
            false,
            InternalSubtype::IdResponse.code(),
            new_id.to_string(),
        )
    }

    /// I_TIME 应答：本地偏移校正后的 epoch 秒。
    pub fn time_response(node_id: u8, child_id: u8, epoch_seconds: i64) -> Self {
        Self::outgoing(
            node_id,
            child_id,
            MessageType::Internal,
            false,
            InternalSubtype::Time.code(),
            epoch_seconds.to_string(),
        )
    }

    /// I_CONFIG 应答："I"（英制）或 "M"（公制）。
    pub fn config_response(node_id: u8, child_id: u8, imperial: bool) -> Self {
        Self::outgoing(
            node_id,
            child_id,
            MessageType::Internal,
            false,
            InternalSubtype::Config.code(),
            if imperial { "I" } else { "M" },
        )
    }

    pub fn is_set(&self) -> bool {
        self.msg_type == MessageType::Set
    }

    pub fn is_req(&self) -> bool {
        self.msg_type == MessageType::Req
    }

    pub fn is_set_or_req(&self) -> bool {
        self.is_set() || self.is_req()
    }

    /// 是否为指定子类型的 INTERNAL 消息。
    pub fn is_internal(&self, kind: InternalSubtype) -> bool {
        self.msg_type == MessageType::Internal && self.subtype == kind.code()
    }
}

/// 节点 ID 校验：255 为广播保留地址，不会对应注册表中的节点。
pub fn is_valid_node_id(id: u8) -> bool {
    id != NODE_ID_BROADCAST
}
