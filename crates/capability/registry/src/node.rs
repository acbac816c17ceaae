//! 节点：网络上的一个物理设备。

use crate::child::Child;
use crate::RegistryError;
use domain::message::{is_valid_node_id, Message, MessageType};
use domain::VariableKind;
use std::collections::HashMap;
use tracing::warn;

/// 节点级配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    /// 巡检时是否向该节点请求心跳应答
    pub request_heartbeat_response: bool,
    /// 期望更新窗口（分钟），0 及以下表示未设置。
    /// 与心跳巡检互斥：二者同时启用时心跳优先，窗口检查跳过该节点。
    pub expect_update_timeout: i64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            request_heartbeat_response: false,
            expect_update_timeout: -1,
        }
    }
}

impl NodeConfig {
    /// 合并策略：布尔取逻辑或，窗口仅在未设置时补齐。
    pub fn merge(&mut self, other: &NodeConfig) {
        self.request_heartbeat_response |= other.request_heartbeat_response;
        if self.expect_update_timeout <= 0 {
            self.expect_update_timeout = other.expect_update_timeout;
        }
    }
}

/// 节点。
///
/// 节点只会被显式移除，健康巡检只翻转可达标志，从不销毁节点。
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    node_id: u8,
    reachable: bool,
    last_update: i64,
    battery_percent: u8,
    config: NodeConfig,
    children: HashMap<u8, Child>,
}

impl Node {
    pub fn new(node_id: u8) -> Result<Self, RegistryError> {
        if !is_valid_node_id(node_id) {
            return Err(RegistryError::InvalidNodeId(node_id));
        }
        Ok(Self {
            node_id,
            reachable: true,
            last_update: 0,
            battery_percent: 0,
            config: NodeConfig::default(),
            children: HashMap::new(),
        })
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// 最近一次收到该节点任意消息的 epoch 毫秒时间戳，0 表示从未收到。
    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.last_update = now_ms;
    }

    pub fn battery_percent(&self) -> u8 {
        self.battery_percent
    }

    pub fn set_battery_percent(&mut self, percent: u8) {
        self.battery_percent = percent;
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: NodeConfig) {
        self.config = config;
    }

    pub fn children(&self) -> &HashMap<u8, Child> {
        &self.children
    }

    pub fn add_child(&mut self, child: Child) {
        self.children.insert(child.child_id(), child);
    }

    pub fn child(&self, child_id: u8) -> Option<&Child> {
        self.children.get(&child_id)
    }

    pub fn child_mut(&mut self, child_id: u8) -> Option<&mut Child> {
        self.children.get_mut(&child_id)
    }

    /// 合并另一个同 ID 节点：配置取并，子设备并集，两边都有的递归合并。
    pub fn merge(&mut self, other: Node) -> Result<(), RegistryError> {
        if other.node_id != self.node_id {
            return Err(RegistryError::Merge(format!(
                "cannot merge node {} into node {}",
                other.node_id, self.node_id
            )));
        }
        self.config.merge(&other.config);
        for (child_id, child) in other.children {
            match self.children.get_mut(&child_id) {
                Some(existing) => existing.merge(child),
                None => {
                    self.children.insert(child_id, child);
                }
            }
        }
        Ok(())
    }

    /// 写入变量新值并生成对应的出站 SET 消息。
    ///
    /// 旧值成为可回退的先前状态（无 ack 回退用）。节点不可达时
    /// 跳过写入只生成消息：状态不入库，发送与否由调用方决定。
    pub fn update_variable_state(
        &mut self,
        child_id: u8,
        kind: VariableKind,
        value: impl Into<String>,
    ) -> Result<Message, RegistryError> {
        let node_id = self.node_id;
        let reachable = self.reachable;
        let child = self
            .children
            .get_mut(&child_id)
            .ok_or(RegistryError::UnknownChild {
                node: node_id,
                child: child_id,
            })?;
        let value = value.into();
        {
            let variable = child
                .variable_mut(kind.code())
                .ok_or(RegistryError::UnknownVariable {
                    node: node_id,
                    child: child_id,
                    subtype: kind.code(),
                })?;
            if reachable {
                variable.set(value.clone());
            } else {
                warn!(
                    node_id,
                    child_id,
                    subtype = kind.code(),
                    "node unreachable, state not recorded"
                );
            }
        }
        let config = child.config();
        let mut msg = Message::outgoing(
            node_id,
            child_id,
            MessageType::Set,
            config.request_ack,
            kind.code(),
            value,
        );
        msg.revert = config.revert_on_no_ack;
        msg.smart_sleep = config.smart_sleep;
        Ok(msg)
    }
}
