//! 网关协调者：注册表与连接的唯一属主。
//!
//! 入站报文按类型路由到注册表变更与事件扇出；出站命令统一经过
//! 连接的出站队列。ID 预留、I_CONFIG / I_TIME 应答、无 ack 回退
//! 等网关级服务也在这里实现。

mod error;
mod events;
mod sanity;

pub use error::GatewayError;
pub use events::{EventRegister, GatewayEvent, GatewayEventListener};
pub use sanity::{NetworkSanityChecker, RunOutcome, SanityOptions};

use async_trait::async_trait;
use domain::message::{NODE_ID_BROADCAST, NODE_ID_GATEWAY};
use domain::{InternalSubtype, Message, MessageType, PresentationCode, VariableKind};
use sensornet_protocol::{Connection, InboundHandler};
use sensornet_registry::{now_epoch_ms, Node, SensorRegistry};
use std::sync::{Arc, OnceLock, RwLock as StdRwLock};
use time::UtcOffset;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// 网关运行参数。
#[derive(Debug, Clone, Copy)]
pub struct GatewayOptions {
    /// I_CONFIG 应答使用英制（"I"）还是公制（"M"）
    pub imperial_units: bool,
    /// 连接建立后是否立即发一次版本探测
    pub startup_probe: bool,
    /// 巡检配置，None 表示不启用
    pub sanity: Option<SanityOptions>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            imperial_units: false,
            startup_probe: true,
            sanity: None,
        }
    }
}

/// 传感器网络网关。
pub struct SensorGateway {
    registry: Arc<SensorRegistry>,
    events: Arc<EventRegister>,
    options: GatewayOptions,
    connection: OnceLock<Arc<Mutex<Connection>>>,
    outbound: StdRwLock<Option<mpsc::Sender<Message>>>,
    sanity: Mutex<Option<NetworkSanityChecker>>,
}

impl SensorGateway {
    pub fn new(
        registry: Arc<SensorRegistry>,
        events: Arc<EventRegister>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            registry,
            events,
            options,
            connection: OnceLock::new(),
            outbound: StdRwLock::new(None),
            sanity: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<SensorRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventRegister> {
        &self.events
    }

    /// 挂接连接。只允许挂接一次，重复调用被忽略。
    pub fn attach_connection(&self, connection: Connection) {
        if self
            .connection
            .set(Arc::new(Mutex::new(connection)))
            .is_err()
        {
            warn!("connection already attached, ignoring");
        }
    }

    /// 建立连接并启动网关服务（可选的启动探测与健康巡检）。
    pub async fn startup(&self) -> Result<(), GatewayError> {
        let connection = self.connection.get().ok_or(GatewayError::NotAttached)?;
        let sender = {
            let mut conn = connection.lock().await;
            conn.connect().await?;
            conn.sender().ok_or(sensornet_protocol::ProtocolError::QueueClosed)?
        };
        *self.outbound.write().map_err(|_| GatewayError::Lock)? = Some(sender.clone());

        if self.options.startup_probe {
            self.send_message(Message::version_probe()).await?;
        }

        if let Some(options) = self.options.sanity {
            let mut slot = self.sanity.lock().await;
            if slot.is_none() {
                let mut checker = NetworkSanityChecker::new(
                    options,
                    Arc::clone(&self.registry),
                    Arc::clone(&self.events),
                    sender,
                    Arc::clone(connection),
                );
                checker.start();
                *slot = Some(checker);
            }
        }
        info!("gateway started");
        Ok(())
    }

    /// 关停：停巡检、断连接、清监听者。
    pub async fn shutdown(&self) {
        if let Some(mut checker) = self.sanity.lock().await.take() {
            checker.stop();
        }
        if let Some(connection) = self.connection.get() {
            connection.lock().await.request_disconnection(false).await;
        }
        self.events.clear().await;
        info!("gateway shut down");
    }

    /// 把一条出站消息交给连接的写队列。
    pub async fn send_message(&self, msg: Message) -> Result<(), GatewayError> {
        let sender = self
            .outbound
            .read()
            .map_err(|_| GatewayError::Lock)?
            .clone()
            .ok_or(sensornet_protocol::ProtocolError::QueueClosed)?;
        sender
            .send(msg)
            .await
            .map_err(|_| sensornet_protocol::ProtocolError::QueueClosed)?;
        Ok(())
    }

    /// 写变量并下发对应 SET。不可达节点的状态不入库，消息照发。
    pub async fn set_variable(
        &self,
        node_id: u8,
        child_id: u8,
        kind: VariableKind,
        value: &str,
    ) -> Result<(), GatewayError> {
        if matches!(self.registry.is_reachable(node_id), Ok(false)) {
            sensornet_telemetry::record_dropped_unreachable();
        }
        let msg = self
            .registry
            .update_variable_state(node_id, child_id, kind, value)?;
        self.send_message(msg).await
    }

    /// 外部报告出站 SET/REQ 未收到 ack：有先前状态则回退并通知，否则只记日志。
    pub async fn handle_ack_not_received(&self, msg: &Message) {
        if !msg.is_set_or_req() {
            debug!(
                node_id = msg.node_id,
                child_id = msg.child_id,
                "no ack received, nothing to revert"
            );
            return;
        }
        match self
            .registry
            .is_revertible(msg.node_id, msg.child_id, msg.subtype)
        {
            Ok(true) => match self
                .registry
                .revert_variable(msg.node_id, msg.child_id, msg.subtype)
            {
                Ok(restored) => {
                    sensornet_telemetry::record_revert();
                    info!(
                        node_id = msg.node_id,
                        child_id = msg.child_id,
                        subtype = msg.subtype,
                        value = restored.as_deref().unwrap_or(""),
                        "no ack received, variable reverted"
                    );
                    self.events
                        .publish(&GatewayEvent::VariableReverted {
                            node_id: msg.node_id,
                            child_id: msg.child_id,
                            subtype: msg.subtype,
                        })
                        .await;
                }
                Err(err) => warn!(error = %err, "revert failed"),
            },
            _ => {
                warn!(
                    node_id = msg.node_id,
                    child_id = msg.child_id,
                    subtype = msg.subtype,
                    "no ack received and variable not revertible"
                );
            }
        }
    }

    /// 预留最小空闲节点 ID 并通知监听者。
    pub async fn reserve_id(&self) -> Result<u8, GatewayError> {
        let node_id = self.registry.reserve_id()?;
        sensornet_telemetry::record_id_reserved();
        info!(node_id, "node id reserved");
        self.events
            .publish(&GatewayEvent::IdReserved { node_id })
            .await;
        Ok(node_id)
    }

    pub fn add_node(&self, node: Node, merge_if_exist: bool) -> Result<(), GatewayError> {
        self.registry.add_node(node, merge_if_exist)?;
        Ok(())
    }

    pub fn remove_node(&self, node_id: u8) -> Result<bool, GatewayError> {
        Ok(self.registry.remove_node(node_id)?)
    }

    /// 读取变量当前值，未赋值返回 None。
    pub fn variable(
        &self,
        node_id: u8,
        child_id: u8,
        subtype: u8,
    ) -> Result<Option<String>, GatewayError> {
        Ok(self.registry.variable_value(node_id, child_id, subtype)?)
    }

    /// 入站报文路由主入口。
    pub async fn handle_incoming(&self, msg: Message) {
        self.events
            .publish(&GatewayEvent::MessageReceived(msg.clone()))
            .await;

        // ID 请求的发送方还没有身份，不入表也不刷新时间戳
        let id_request = msg.is_internal(InternalSubtype::IdRequest);
        if !id_request && msg.node_id != NODE_ID_GATEWAY && msg.node_id != NODE_ID_BROADCAST {
            self.ensure_node(msg.node_id).await;
            if let Err(err) = self.registry.touch_from_message(&msg) {
                warn!(error = %err, "failed to refresh timestamps");
            }
            match self.registry.refresh_reachable(msg.node_id) {
                Ok(true) => {
                    info!(node_id = msg.node_id, "traffic observed, node reachable again");
                    self.events
                        .publish(&GatewayEvent::NodeReachability {
                            node_id: msg.node_id,
                            reachable: true,
                        })
                        .await;
                }
                Ok(false) => {}
                Err(err) => warn!(error = %err, "failed to refresh reachability"),
            }
        }

        let handled = match msg.msg_type {
            MessageType::Presentation => self.handle_presentation(&msg).await,
            MessageType::Set | MessageType::Req => self.handle_set_req(&msg).await,
            MessageType::Internal => self.handle_internal(&msg).await,
            MessageType::Stream => false,
        };
        if !handled {
            self.handle_special(&msg).await;
        }
    }

    /// 未知的合法发送方注册为裸节点（presentation 到来之前设备就已可见）。
    async fn ensure_node(&self, node_id: u8) {
        match self.registry.contains(node_id) {
            Ok(false) => {
                let node = match Node::new(node_id) {
                    Ok(node) => node,
                    Err(err) => {
                        warn!(node_id, error = %err, "invalid sender id");
                        return;
                    }
                };
                if let Err(err) = self.registry.register(node) {
                    warn!(node_id, error = %err, "failed to register node");
                    return;
                }
                info!(node_id, "new node discovered");
                self.events
                    .publish(&GatewayEvent::NodeDiscovered {
                        node_id,
                        child_id: None,
                    })
                    .await;
            }
            Ok(true) => {}
            Err(err) => warn!(error = %err, "registry lookup failed"),
        }
    }

    async fn handle_presentation(&self, msg: &Message) -> bool {
        let code = match PresentationCode::from_code(msg.subtype) {
            Some(code) => code,
            None => {
                // 未知设备类别静默丢弃，不创建子设备
                debug!(code = msg.subtype, "unknown presentation code, ignoring");
                return true;
            }
        };
        match self
            .registry
            .present_child(msg.node_id, msg.child_id, code)
        {
            Ok(outcome) => {
                if outcome.node_created {
                    self.events
                        .publish(&GatewayEvent::NodeDiscovered {
                            node_id: msg.node_id,
                            child_id: None,
                        })
                        .await;
                }
                if outcome.child_created {
                    info!(
                        node_id = msg.node_id,
                        child_id = msg.child_id,
                        code = msg.subtype,
                        "new child presented"
                    );
                    self.events
                        .publish(&GatewayEvent::NodeDiscovered {
                            node_id: msg.node_id,
                            child_id: Some(msg.child_id),
                        })
                        .await;
                }
            }
            Err(err) => warn!(error = %err, "presentation handling failed"),
        }
        true
    }

    async fn handle_set_req(&self, msg: &Message) -> bool {
        if msg.is_set() {
            match self.registry.is_reachable(msg.node_id) {
                Ok(true) => match self.registry.set_variable_value(
                    msg.node_id,
                    msg.child_id,
                    msg.subtype,
                    &msg.payload,
                ) {
                    Ok(()) => {
                        self.events
                            .publish(&GatewayEvent::VariableUpdated {
                                node_id: msg.node_id,
                                child_id: msg.child_id,
                                subtype: msg.subtype,
                            })
                            .await;
                    }
                    Err(err) => debug!(error = %err, "set message dropped"),
                },
                Ok(false) => {
                    sensornet_telemetry::record_dropped_unreachable();
                    warn!(node_id = msg.node_id, "node unreachable, set dropped");
                }
                Err(err) => debug!(error = %err, "set for unknown node dropped"),
            }
        } else {
            // REQ：以出站 SET 回放当前值，从未赋值时默认 "0"
            match self
                .registry
                .variable_value(msg.node_id, msg.child_id, msg.subtype)
            {
                Ok(value) => {
                    let reply = Message::outgoing(
                        msg.node_id,
                        msg.child_id,
                        MessageType::Set,
                        false,
                        msg.subtype,
                        value.unwrap_or_else(|| "0".to_string()),
                    );
                    if let Err(err) = self.send_message(reply).await {
                        warn!(error = %err, "failed to answer req");
                    }
                }
                Err(err) => debug!(error = %err, "req for unknown variable dropped"),
            }
        }
        true
    }

    async fn handle_internal(&self, msg: &Message) -> bool {
        if msg.is_internal(InternalSubtype::BatteryLevel) {
            match msg.payload.parse::<u8>() {
                Ok(percent) => {
                    if let Err(err) = self.registry.set_battery(msg.node_id, percent) {
                        debug!(error = %err, "battery update dropped");
                    } else {
                        self.events
                            .publish(&GatewayEvent::BatteryUpdated {
                                node_id: msg.node_id,
                                percent,
                            })
                            .await;
                    }
                }
                Err(_) => warn!(payload = %msg.payload, "unparsable battery level"),
            }
            true
        } else if msg.is_internal(InternalSubtype::HeartbeatResponse) {
            debug!(node_id = msg.node_id, "heartbeat response");
            true
        } else if msg.is_internal(InternalSubtype::Version) {
            debug!(version = %msg.payload, "gateway firmware version");
            true
        } else if msg.is_internal(InternalSubtype::LogMessage) {
            debug!(log = %msg.payload, "gateway log");
            true
        } else if msg.is_internal(InternalSubtype::GatewayReady) {
            info!("gateway device ready");
            true
        } else {
            false
        }
    }

    /// 需要网关代答的服务消息：单位制、时间、ID 分配。
    async fn handle_special(&self, msg: &Message) {
        if msg.msg_type != MessageType::Internal {
            debug!(
                node_id = msg.node_id,
                msg_type = ?msg.msg_type,
                "unhandled message"
            );
            return;
        }
        if msg.is_internal(InternalSubtype::Config) {
            let reply =
                Message::config_response(msg.node_id, msg.child_id, self.options.imperial_units);
            if let Err(err) = self.send_message(reply).await {
                warn!(error = %err, "failed to answer config request");
            }
        } else if msg.is_internal(InternalSubtype::Time) {
            let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
            let epoch_seconds = now_epoch_ms() / 1000 + i64::from(offset.whole_seconds());
            let reply = Message::time_response(msg.node_id, msg.child_id, epoch_seconds);
            if let Err(err) = self.send_message(reply).await {
                warn!(error = %err, "failed to answer time request");
            }
        } else if msg.is_internal(InternalSubtype::IdRequest) {
            self.answer_id_request().await;
        } else {
            debug!(subtype = msg.subtype, "unhandled internal message");
        }
    }

    /// ID 请求应答：预留失败（ID 耗尽）时不作答，设备继续等待。
    async fn answer_id_request(&self) {
        match self.reserve_id().await {
            Ok(node_id) => {
                if let Err(err) = self.send_message(Message::id_response(node_id)).await {
                    warn!(error = %err, "failed to send id response");
                }
            }
            Err(err) => warn!(error = %err, "cannot answer id request"),
        }
    }

    async fn handle_connection_status(&self, connected: bool) {
        info!(connected, "connection status changed");
        if connected {
            sensornet_telemetry::record_reconnect();
        }
        self.events
            .publish(&GatewayEvent::ConnectionStatus { connected })
            .await;

        match self.registry.set_all_reachable(connected) {
            Ok(flipped) => {
                for node_id in flipped {
                    self.events
                        .publish(&GatewayEvent::NodeReachability {
                            node_id,
                            reachable: connected,
                        })
                        .await;
                }
            }
            Err(err) => warn!(error = %err, "failed to update reachability"),
        }

        if !connected {
            if let Ok(mut guard) = self.outbound.write() {
                *guard = None;
            }
            if let Some(mut checker) = self.sanity.lock().await.take() {
                checker.stop();
            }
        }
    }
}

#[async_trait]
impl InboundHandler for SensorGateway {
    async fn message_received(&self, msg: Message) {
        self.handle_incoming(msg).await;
    }

    async fn connection_status(&self, connected: bool) {
        self.handle_connection_status(connected).await;
    }
}
