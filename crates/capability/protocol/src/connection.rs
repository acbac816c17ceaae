//! 统一连接循环：一个读任务 + 一个写任务。
//!
//! 读任务按行消费链路字节流，解析成功的报文交给处理器，
//! 解析失败的行记日志后丢弃（单行损坏不拖垮连接）。
//! 写任务串行消费出站队列，两次写出之间等待 send_delay，
//! 避免打爆射频侧只有几个报文深度的硬件缓冲。

use crate::error::ProtocolError;
use crate::link::GatewayLink;
use async_trait::async_trait;
use domain::{parse, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 入站事件处理器：连接循环与上层协调者之间的接缝。
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// 收到一条解析成功的报文。
    async fn message_received(&self, msg: Message);

    /// 连接状态变化（建立 / 断开）。
    async fn connection_status(&self, connected: bool);
}

/// 链路状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// 网关连接：持有链路与读写任务。
pub struct Connection {
    link: Box<dyn GatewayLink>,
    handler: Arc<dyn InboundHandler>,
    send_delay: Duration,
    state: LinkState,
    outbound: Option<mpsc::Sender<Message>>,
    reader_task: Option<JoinHandle<()>>,
    writer_task: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn new(
        link: Box<dyn GatewayLink>,
        handler: Arc<dyn InboundHandler>,
        send_delay: Duration,
    ) -> Self {
        Self {
            link,
            handler,
            send_delay,
            state: LinkState::Disconnected,
            outbound: None,
            reader_task: None,
            writer_task: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// 打开链路并启动读写任务。已连接时幂等返回。
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.state == LinkState::Connected {
            return Ok(());
        }
        self.state = LinkState::Connecting;
        let channels = match self.link.open().await {
            Ok(channels) => channels,
            Err(err) => {
                self.state = LinkState::Disconnected;
                return Err(err);
            }
        };

        let (tx, mut rx) = mpsc::channel::<Message>(64);

        let handler = Arc::clone(&self.handler);
        let reader = channels.reader;
        self.reader_task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(reader);
            let mut line = String::new();
            loop {
                line.clear();
                match lines.read_line(&mut line).await {
                    Ok(0) => {
                        info!("link closed by peer");
                        handler.connection_status(false).await;
                        break;
                    }
                    Ok(_) => {
                        let raw = line.trim_end_matches(['\r', '\n']);
                        if raw.is_empty() {
                            continue;
                        }
                        match parse(raw) {
                            Ok(msg) => {
                                sensornet_telemetry::record_message_received();
                                handler.message_received(msg).await;
                            }
                            Err(err) => {
                                sensornet_telemetry::record_parse_failure();
                                warn!(line = %raw, error = %err, "dropping garbled line");
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "link read error");
                        handler.connection_status(false).await;
                        break;
                    }
                }
            }
        }));

        let send_delay = self.send_delay;
        let mut writer = channels.writer;
        self.writer_task = Some(tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match writer.write_message(&msg).await {
                    Ok(()) => {
                        sensornet_telemetry::record_message_sent();
                        debug!(node_id = msg.node_id, child_id = msg.child_id, "message sent");
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to write outbound message");
                        continue;
                    }
                }
                if !send_delay.is_zero() {
                    tokio::time::sleep(send_delay).await;
                }
            }
        }));

        self.outbound = Some(tx);
        self.state = LinkState::Connected;
        self.handler.connection_status(true).await;
        Ok(())
    }

    /// 出站队列发送端，未连接时为 None。
    pub fn sender(&self) -> Option<mpsc::Sender<Message>> {
        self.outbound.clone()
    }

    /// 入队一条出站消息。
    pub async fn send(&self, msg: Message) -> Result<(), ProtocolError> {
        let tx = self.outbound.as_ref().ok_or(ProtocolError::QueueClosed)?;
        tx.send(msg).await.map_err(|_| ProtocolError::QueueClosed)
    }

    /// 断开连接：先停写再停读，然后关闭链路。幂等。
    pub async fn request_disconnection(&mut self, hard: bool) {
        if self.state == LinkState::Disconnected {
            return;
        }
        self.outbound = None;
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.link.close(hard).await;
        self.state = LinkState::Disconnected;
        self.handler.connection_status(false).await;
    }
}
