//! 事件注册表：网关与巡检器向外部监听者扇出事件的唯一通道。

use async_trait::async_trait;
use domain::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// 网关对外事件。
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// 收到一条解析成功的入站报文（路由之前扇出）
    MessageReceived(Message),
    /// 连接建立 / 断开
    ConnectionStatus { connected: bool },
    /// 发现新节点（child_id 为 None）或新子设备
    NodeDiscovered { node_id: u8, child_id: Option<u8> },
    /// 变量值更新
    VariableUpdated { node_id: u8, child_id: u8, subtype: u8 },
    /// 变量因无 ack 回退
    VariableReverted { node_id: u8, child_id: u8, subtype: u8 },
    /// 节点电量更新
    BatteryUpdated { node_id: u8, percent: u8 },
    /// 节点可达性翻转
    NodeReachability { node_id: u8, reachable: bool },
    /// ID 预留完成
    IdReserved { node_id: u8 },
}

/// 事件监听者。
#[async_trait]
pub trait GatewayEventListener: Send + Sync {
    async fn on_event(&self, event: &GatewayEvent);
}

/// 线程安全的监听者列表。
///
/// 发布时先拷出监听者快照再逐个通知，通知过程中不持锁，
/// 监听者回调里可以安全地再订阅/退订。
pub struct EventRegister {
    listeners: RwLock<Vec<(u64, Arc<dyn GatewayEventListener>)>>,
    next_handle: AtomicU64,
}

impl Default for EventRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegister {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// 订阅，返回退订用的句柄。
    pub async fn subscribe(&self, listener: Arc<dyn GatewayEventListener>) -> u64 {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().await.push((handle, listener));
        handle
    }

    /// 退订。句柄未注册时静默返回。
    pub async fn unsubscribe(&self, handle: u64) {
        self.listeners.write().await.retain(|(h, _)| *h != handle);
    }

    /// 清空所有监听者（网关关停时使用）。
    pub async fn clear(&self) {
        self.listeners.write().await.clear();
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// 向所有监听者扇出一个事件。
    pub async fn publish(&self, event: &GatewayEvent) {
        let snapshot: Vec<Arc<dyn GatewayEventListener>> = self
            .listeners
            .read()
            .await
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener.on_event(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Counter {
        seen: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl GatewayEventListener for Counter {
        async fn on_event(&self, event: &GatewayEvent) {
            if let GatewayEvent::IdReserved { node_id } = event {
                self.seen.lock().await.push(*node_id);
            }
        }
    }

    #[tokio::test]
    async fn unsubscribed_listener_stops_receiving() {
        let register = EventRegister::new();
        let counter = Arc::new(Counter::default());
        let handle = register.subscribe(counter.clone()).await;

        register.publish(&GatewayEvent::IdReserved { node_id: 1 }).await;
        register.unsubscribe(handle).await;
        register.publish(&GatewayEvent::IdReserved { node_id: 2 }).await;

        assert_eq!(*counter.seen.lock().await, vec![1]);
        assert_eq!(register.listener_count().await, 0);
    }
}
