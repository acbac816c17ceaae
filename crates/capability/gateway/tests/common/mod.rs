#![allow(dead_code)]

//! 集成测试公共设施：环回链路、事件录制器、网关装配。

use async_trait::async_trait;
use domain::Message;
use sensornet_gateway::{
    EventRegister, GatewayEvent, GatewayEventListener, GatewayOptions, SensorGateway,
};
use sensornet_protocol::{
    Connection, GatewayLink, InboundHandler, LineWriter, LinkChannels, ProtocolError,
};
use sensornet_registry::SensorRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::Mutex;

/// 内存环回链路：测试端持有另一头的读写流。
pub struct LoopLink {
    pub reader: Option<DuplexStream>,
    pub writer: Option<DuplexStream>,
}

#[async_trait]
impl GatewayLink for LoopLink {
    async fn open(&mut self) -> Result<LinkChannels, ProtocolError> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| ProtocolError::Connection("link already opened".into()))?;
        let writer = self
            .writer
            .take()
            .ok_or_else(|| ProtocolError::Connection("link already opened".into()))?;
        Ok(LinkChannels {
            reader: Box::new(reader),
            writer: Box::new(LineWriter::new(writer)),
        })
    }

    async fn close(&mut self, _hard: bool) {}
}

/// 什么都不做的入站处理器（巡检器单测用）。
pub struct NoopHandler;

#[async_trait]
impl InboundHandler for NoopHandler {
    async fn message_received(&self, _msg: Message) {}
    async fn connection_status(&self, _connected: bool) {}
}

/// 把收到的事件原样录下来的监听者。
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<GatewayEvent>>,
}

#[async_trait]
impl GatewayEventListener for RecordingListener {
    async fn on_event(&self, event: &GatewayEvent) {
        self.events.lock().await.push(event.clone());
    }
}

impl RecordingListener {
    pub async fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&GatewayEvent) -> bool,
    {
        self.events.lock().await.iter().filter(|e| predicate(e)).count()
    }
}

/// 装配好的网关与链路对端。
pub struct Harness {
    pub gateway: Arc<SensorGateway>,
    pub listener: Arc<RecordingListener>,
    pub peer_write: DuplexStream,
    pub peer_read: DuplexStream,
}

/// 建一个挂在环回链路上的网关，不发启动探测，不启用巡检。
pub async fn harness() -> Harness {
    harness_with(GatewayOptions {
        imperial_units: false,
        startup_probe: false,
        sanity: None,
    })
    .await
}

pub async fn harness_with(options: GatewayOptions) -> Harness {
    let registry = Arc::new(SensorRegistry::new());
    let events = Arc::new(EventRegister::new());
    let gateway = Arc::new(SensorGateway::new(registry, events, options));

    let listener = Arc::new(RecordingListener::default());
    gateway
        .events()
        .subscribe(Arc::clone(&listener) as Arc<dyn GatewayEventListener>)
        .await;

    let (peer_write, local_read) = tokio::io::duplex(4096);
    let (local_write, peer_read) = tokio::io::duplex(4096);
    let link = LoopLink {
        reader: Some(local_read),
        writer: Some(local_write),
    };
    let connection = Connection::new(
        Box::new(link),
        Arc::clone(&gateway) as Arc<dyn InboundHandler>,
        Duration::ZERO,
    );
    gateway.attach_connection(connection);
    gateway.startup().await.expect("startup");

    Harness {
        gateway,
        listener,
        peer_write,
        peer_read,
    }
}

/// 读链路对端的下一行（去掉行尾），2 秒超时。
pub async fn read_line(stream: &mut DuplexStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut byte))
            .await
            .expect("read timed out")
            .expect("read");
        if n == 0 || byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).expect("utf8")
}
