//! 注册表本体：节点树 + 粗粒度读写锁。

use crate::child::Child;
use crate::node::{Node, NodeConfig};
use crate::{now_epoch_ms, RegistryError};
use domain::message::{Message, NODE_ID_BROADCAST, NODE_ID_GATEWAY};
use domain::{PresentationCode, VariableKind};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

/// present_child 的结果：是否新建了节点 / 子设备。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentOutcome {
    pub node_created: bool,
    pub child_created: bool,
}

/// 传感器网络注册表。
///
/// 单把读写锁保护整棵节点树，所有方法内部获取并释放锁，
/// 复合操作（如 ID 预留的扫描加插入）在一次持锁内完成。
pub struct SensorRegistry {
    nodes: RwLock<HashMap<u8, Node>>,
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// 从缓存的 ID 列表恢复：每个 ID 注册一个裸节点，非法 ID 告警后跳过。
    pub fn from_ids(ids: &[u8]) -> Self {
        let registry = Self::new();
        for &id in ids {
            match Node::new(id) {
                Ok(node) => {
                    if let Err(err) = registry.register(node) {
                        warn!(node_id = id, error = %err, "failed to restore cached node");
                    }
                }
                Err(err) => {
                    warn!(node_id = id, error = %err, "skipping invalid cached node id");
                }
            }
        }
        registry
    }

    /// 已知节点 ID 的有序列表。
    pub fn node_ids(&self) -> Result<Vec<u8>, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        let mut ids: Vec<u8> = nodes.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn contains(&self, node_id: u8) -> Result<bool, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        Ok(nodes.contains_key(&node_id))
    }

    /// 节点快照（深拷贝），不存在返回 None。
    pub fn snapshot(&self, node_id: u8) -> Result<Option<Node>, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        Ok(nodes.get(&node_id).cloned())
    }

    /// 直接注册节点，同 ID 已存在时覆盖并告警。
    pub fn register(&self, node: Node) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        if nodes.insert(node.node_id(), node).is_some() {
            warn!("node already present in registry, overwriting");
        }
        Ok(())
    }

    /// 添加节点。已存在时按 merge_if_exist 决定是合并还是覆盖。
    pub fn add_node(&self, node: Node, merge_if_exist: bool) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        if merge_if_exist {
            if let Some(existing) = nodes.get_mut(&node.node_id()) {
                return existing.merge(node);
            }
        }
        nodes.insert(node.node_id(), node);
        Ok(())
    }

    pub fn remove_node(&self, node_id: u8) -> Result<bool, RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        Ok(nodes.remove(&node_id).is_some())
    }

    /// 预留最小空闲 ID（[1, 254]）并原子注册一个裸节点。
    ///
    /// 扫描与插入在同一次持锁内完成，并发请求不会拿到同一个 ID。
    pub fn reserve_id(&self) -> Result<u8, RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        let free = (1..NODE_ID_BROADCAST)
            .find(|id| !nodes.contains_key(id))
            .ok_or(RegistryError::IdsExhausted)?;
        let node = Node::new(free)?;
        nodes.insert(free, node);
        Ok(free)
    }

    /// 用一条入站消息刷新时间戳：节点、子设备、对应变量槽位逐级更新。
    /// 网关自身与广播地址不入表。
    pub fn touch_from_message(&self, msg: &Message) -> Result<(), RegistryError> {
        if msg.node_id == NODE_ID_GATEWAY || msg.node_id == NODE_ID_BROADCAST {
            return Ok(());
        }
        let now = now_epoch_ms();
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        if let Some(node) = nodes.get_mut(&msg.node_id) {
            node.touch(now);
            if let Some(child) = node.child_mut(msg.child_id) {
                child.touch(now);
                if msg.is_set_or_req() {
                    if let Some(variable) = child.variable_mut(msg.subtype) {
                        variable.touch(now);
                    }
                }
            }
        }
        Ok(())
    }

    /// 标记节点可达并返回标志是否发生了翻转。
    pub fn refresh_reachable(&self, node_id: u8) -> Result<bool, RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        match nodes.get_mut(&node_id) {
            Some(node) if !node.is_reachable() => {
                node.set_reachable(true);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn set_reachable(&self, node_id: u8, reachable: bool) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        node.set_reachable(reachable);
        Ok(())
    }

    /// 批量翻转所有节点的可达标志，返回实际发生变化的节点 ID。
    pub fn set_all_reachable(&self, reachable: bool) -> Result<Vec<u8>, RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        let mut flipped = Vec::new();
        for node in nodes.values_mut() {
            if node.is_reachable() != reachable {
                node.set_reachable(reachable);
                flipped.push(node.node_id());
            }
        }
        flipped.sort_unstable();
        Ok(flipped)
    }

    pub fn is_reachable(&self, node_id: u8) -> Result<bool, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        Ok(node.is_reachable())
    }

    pub fn set_battery(&self, node_id: u8, percent: u8) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        node.set_battery_percent(percent);
        Ok(())
    }

    /// 写入变量值。槽位不存在时按需创建（未知类别设备也可上报）。
    pub fn set_variable_value(
        &self,
        node_id: u8,
        child_id: u8,
        subtype: u8,
        value: &str,
    ) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        let child = node
            .child_mut(child_id)
            .ok_or(RegistryError::UnknownChild {
                node: node_id,
                child: child_id,
            })?;
        match child.variable_mut(subtype) {
            Some(variable) => {
                variable.set(value);
                Ok(())
            }
            None => Err(RegistryError::UnknownVariable {
                node: node_id,
                child: child_id,
                subtype,
            }),
        }
    }

    /// 读取变量当前值。节点/子设备/槽位任一不存在即报错，未赋值返回 None。
    pub fn variable_value(
        &self,
        node_id: u8,
        child_id: u8,
        subtype: u8,
    ) -> Result<Option<String>, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        let child = node.child(child_id).ok_or(RegistryError::UnknownChild {
            node: node_id,
            child: child_id,
        })?;
        let variable = child
            .variable(subtype)
            .ok_or(RegistryError::UnknownVariable {
                node: node_id,
                child: child_id,
                subtype,
            })?;
        Ok(variable.value().map(String::from))
    }

    pub fn is_revertible(
        &self,
        node_id: u8,
        child_id: u8,
        subtype: u8,
    ) -> Result<bool, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        let revertible = nodes
            .get(&node_id)
            .and_then(|node| node.child(child_id))
            .and_then(|child| child.variable(subtype))
            .map(|variable| variable.is_revertible())
            .unwrap_or(false);
        Ok(revertible)
    }

    /// 回退变量到先前状态，返回回退后的值。
    pub fn revert_variable(
        &self,
        node_id: u8,
        child_id: u8,
        subtype: u8,
    ) -> Result<Option<String>, RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        let child = node
            .child_mut(child_id)
            .ok_or(RegistryError::UnknownChild {
                node: node_id,
                child: child_id,
            })?;
        let variable = child
            .variable_mut(subtype)
            .ok_or(RegistryError::UnknownVariable {
                node: node_id,
                child: child_id,
                subtype,
            })?;
        variable.revert()?;
        Ok(variable.value().map(String::from))
    }

    pub fn node_config(&self, node_id: u8) -> Result<NodeConfig, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        Ok(*node.config())
    }

    pub fn last_update(&self, node_id: u8) -> Result<i64, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        Ok(node.last_update())
    }

    pub fn child_exists(&self, node_id: u8, child_id: u8) -> Result<bool, RegistryError> {
        let nodes = self.nodes.read().map_err(|_| RegistryError::Lock)?;
        Ok(nodes
            .get(&node_id)
            .map(|node| node.child(child_id).is_some())
            .unwrap_or(false))
    }

    /// 处理一次设备声明：节点和子设备都按需创建，已存在的子设备只补齐槽位。
    /// 节点与子设备的创建在同一次持锁内完成。
    pub fn present_child(
        &self,
        node_id: u8,
        child_id: u8,
        code: PresentationCode,
    ) -> Result<PresentOutcome, RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        let mut node_created = false;
        if !nodes.contains_key(&node_id) {
            nodes.insert(node_id, Node::new(node_id)?);
            node_created = true;
        }
        let node = nodes
            .get_mut(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        let child_created = node.child(child_id).is_none();
        if child_created {
            node.add_child(Child::from_presentation(code, child_id));
        } else if let Some(existing) = node.child_mut(child_id) {
            existing.merge(Child::from_presentation(code, child_id));
        }
        Ok(PresentOutcome {
            node_created,
            child_created,
        })
    }

    /// 写入变量新值并生成出站 SET 消息（见 [`Node::update_variable_state`]）。
    pub fn update_variable_state(
        &self,
        node_id: u8,
        child_id: u8,
        kind: VariableKind,
        value: &str,
    ) -> Result<Message, RegistryError> {
        let mut nodes = self.nodes.write().map_err(|_| RegistryError::Lock)?;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(RegistryError::UnknownNode(node_id))?;
        node.update_variable_state(child_id, kind, value)
    }
}
