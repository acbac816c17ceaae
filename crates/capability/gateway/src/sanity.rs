//! 网络健康巡检。
//!
//! 周期任务，仅在连接建立期间运行。每轮三步：
//! 1. 版本探测链路，连续 N 轮无响应时请求硬断开并放弃本轮；
//! 2. （可选）向所有已知节点发心跳请求，按每节点未响应计数翻转可达性；
//! 3. 对使用"期望更新窗口"策略的节点检查最近更新时间。
//!
//! 探测采用"发送后定长等待再查收"的简单设计，等待期间通过事件
//! 注册表临时挂一个只活一轮的监听者，轮末退订，避免观察者累积。

use crate::events::{EventRegister, GatewayEvent, GatewayEventListener};
use async_trait::async_trait;
use domain::{InternalSubtype, Message};
use sensornet_protocol::Connection;
use sensornet_registry::{now_epoch_ms, SensorRegistry};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// 探测消息发出后等待响应的定长延迟。
const SEND_DELAY: Duration = Duration::from_secs(3);

/// 巡检配置。
#[derive(Debug, Clone, Copy)]
pub struct SanityOptions {
    /// 巡检周期（分钟）
    pub interval_minutes: u64,
    /// 连续多少轮版本探测无响应后判定链路死亡
    pub link_attempts_before_disconnect: u32,
    /// 是否启用节点心跳探测
    pub heartbeat_enabled: bool,
    /// 连续多少次心跳未响应后翻转节点为不可达
    pub heartbeat_misses_before_unreachable: u32,
}

impl Default for SanityOptions {
    fn default() -> Self {
        Self {
            interval_minutes: 3,
            link_attempts_before_disconnect: 3,
            heartbeat_enabled: false,
            heartbeat_misses_before_unreachable: 3,
        }
    }
}

/// 一轮巡检的链路判定结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    LinkAlive,
    LinkDead,
}

/// 只活一轮的响应监听者。
#[derive(Default)]
struct ProbeListener {
    version_seen: AtomicBool,
    heartbeat_from: StdMutex<HashSet<u8>>,
}

#[async_trait]
impl GatewayEventListener for ProbeListener {
    async fn on_event(&self, event: &GatewayEvent) {
        if let GatewayEvent::MessageReceived(msg) = event {
            if msg.is_internal(InternalSubtype::Version) {
                self.version_seen.store(true, Ordering::Relaxed);
            } else if msg.is_internal(InternalSubtype::HeartbeatResponse) {
                if let Ok(mut responders) = self.heartbeat_from.lock() {
                    responders.insert(msg.node_id);
                }
            }
        }
    }
}

struct SanityState {
    options: SanityOptions,
    registry: Arc<SensorRegistry>,
    events: Arc<EventRegister>,
    outbound: mpsc::Sender<Message>,
    connection: Arc<Mutex<Connection>>,
    /// 每节点连续心跳未响应计数，与注册表锁相互独立
    heartbeat_misses: StdMutex<HashMap<u8, u32>>,
    link_misses: AtomicU32,
}

/// 巡检器句柄：持有周期任务与跨轮计数状态。
pub struct NetworkSanityChecker {
    state: Arc<SanityState>,
    task: Option<JoinHandle<()>>,
}

impl NetworkSanityChecker {
    pub fn new(
        options: SanityOptions,
        registry: Arc<SensorRegistry>,
        events: Arc<EventRegister>,
        outbound: mpsc::Sender<Message>,
        connection: Arc<Mutex<Connection>>,
    ) -> Self {
        Self {
            state: Arc::new(SanityState {
                options,
                registry,
                events,
                outbound,
                connection,
                heartbeat_misses: StdMutex::new(HashMap::new()),
                link_misses: AtomicU32::new(0),
            }),
            task: None,
        }
    }

    /// 启动周期任务。重复启动只告警不重启。
    pub fn start(&mut self) {
        if self.task.is_some() {
            warn!("sanity checker already running");
            return;
        }
        let state = Arc::clone(&self.state);
        let period = Duration::from_secs(state.options.interval_minutes * 60);
        info!(
            interval_minutes = state.options.interval_minutes,
            heartbeat = state.options.heartbeat_enabled,
            "sanity checker started"
        );
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if state.run_once().await == RunOutcome::LinkDead {
                    break;
                }
            }
        }));
    }

    /// 停止周期任务。幂等。
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("sanity checker stopped");
        }
    }

    /// 执行一轮完整巡检。
    pub async fn run_once(&self) -> RunOutcome {
        self.state.run_once().await
    }

    /// 心跳结果评估：翻转可达性并返回 `(node_id, reachable)` 变化列表。
    pub fn evaluate_heartbeats(&self, responders: &HashSet<u8>) -> Vec<(u8, bool)> {
        self.state.evaluate_heartbeats(responders)
    }

    /// 期望更新窗口检查：返回被翻转为不可达的节点列表。
    pub fn check_expected_update(&self, now_ms: i64) -> Vec<u8> {
        self.state.check_expected_update(now_ms)
    }
}

impl Drop for NetworkSanityChecker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SanityState {
    async fn run_once(&self) -> RunOutcome {
        let listener = Arc::new(ProbeListener::default());
        let handle = self
            .events
            .subscribe(Arc::clone(&listener) as Arc<dyn GatewayEventListener>)
            .await;

        let outcome = self.probe(&listener).await;

        self.events.unsubscribe(handle).await;
        outcome
    }

    async fn probe(&self, listener: &ProbeListener) -> RunOutcome {
        // 第一步：版本探测
        if let Err(err) = self.outbound.send(Message::version_probe()).await {
            warn!(error = %err, "failed to send version probe");
            return RunOutcome::LinkAlive;
        }
        tokio::time::sleep(SEND_DELAY).await;

        if listener.version_seen.load(Ordering::Relaxed) {
            self.link_misses.store(0, Ordering::Relaxed);
        } else {
            let misses = self.link_misses.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(misses, "gateway did not answer version probe");
            if misses >= self.options.link_attempts_before_disconnect {
                sensornet_telemetry::record_sanity_disconnect();
                warn!("link considered dead, requesting hard disconnect");
                let connection = Arc::clone(&self.connection);
                tokio::spawn(async move {
                    connection.lock().await.request_disconnection(true).await;
                });
                return RunOutcome::LinkDead;
            }
            return RunOutcome::LinkAlive;
        }

        // 第二步：心跳探测
        if self.options.heartbeat_enabled {
            let node_ids = match self.registry.node_ids() {
                Ok(ids) => ids,
                Err(err) => {
                    warn!(error = %err, "failed to list nodes for heartbeat probe");
                    return RunOutcome::LinkAlive;
                }
            };
            for node_id in node_ids {
                if let Err(err) = self.outbound.send(Message::heartbeat_request(node_id)).await {
                    warn!(node_id, error = %err, "failed to send heartbeat request");
                }
            }
            tokio::time::sleep(SEND_DELAY).await;

            let responders = listener
                .heartbeat_from
                .lock()
                .map(|set| set.clone())
                .unwrap_or_default();
            for (node_id, reachable) in self.evaluate_heartbeats(&responders) {
                self.events
                    .publish(&GatewayEvent::NodeReachability { node_id, reachable })
                    .await;
            }
        }

        // 第三步：期望更新窗口
        for node_id in self.check_expected_update(now_epoch_ms()) {
            self.events
                .publish(&GatewayEvent::NodeReachability {
                    node_id,
                    reachable: false,
                })
                .await;
        }

        RunOutcome::LinkAlive
    }

    fn evaluate_heartbeats(&self, responders: &HashSet<u8>) -> Vec<(u8, bool)> {
        let node_ids = match self.registry.node_ids() {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "failed to list nodes");
                return Vec::new();
            }
        };
        let mut misses = match self.heartbeat_misses.lock() {
            Ok(misses) => misses,
            Err(_) => {
                warn!("heartbeat miss map lock poisoned");
                return Vec::new();
            }
        };
        // 计数只对仍在表中的节点有意义
        misses.retain(|node_id, _| node_ids.binary_search(node_id).is_ok());

        let mut flips = Vec::new();
        for node_id in node_ids {
            let expects_heartbeat = self
                .registry
                .node_config(node_id)
                .map(|config| config.request_heartbeat_response)
                .unwrap_or(false);
            if !expects_heartbeat {
                continue;
            }

            if responders.contains(&node_id) {
                misses.remove(&node_id);
                if matches!(self.registry.is_reachable(node_id), Ok(false)) {
                    if self.registry.set_reachable(node_id, true).is_ok() {
                        info!(node_id, "heartbeat response, node reachable again");
                        flips.push((node_id, true));
                    }
                }
            } else {
                let count = misses.entry(node_id).or_insert(0);
                *count += 1;
                debug!(node_id, misses = *count, "heartbeat response missing");
                if *count >= self.options.heartbeat_misses_before_unreachable
                    && matches!(self.registry.is_reachable(node_id), Ok(true))
                    && self.registry.set_reachable(node_id, false).is_ok()
                {
                    warn!(node_id, "heartbeat threshold reached, node unreachable");
                    flips.push((node_id, false));
                }
            }
        }
        flips
    }

    fn check_expected_update(&self, now_ms: i64) -> Vec<u8> {
        let node_ids = match self.registry.node_ids() {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "failed to list nodes");
                return Vec::new();
            }
        };

        let mut flipped = Vec::new();
        for node_id in node_ids {
            let config = match self.registry.node_config(node_id) {
                Ok(config) => config,
                Err(_) => continue,
            };
            // 心跳探测的节点不走窗口检查，两种策略互斥
            if config.request_heartbeat_response || config.expect_update_timeout <= 0 {
                continue;
            }
            let last_update = self.registry.last_update(node_id).unwrap_or(0);
            let window_ms = config.expect_update_timeout * 60_000;
            if now_ms - last_update > window_ms
                && matches!(self.registry.is_reachable(node_id), Ok(true))
                && self.registry.set_reachable(node_id, false).is_ok()
            {
                warn!(node_id, "no update within expected window, node unreachable");
                flipped.push(node_id);
            }
        }
        flipped
    }
}
