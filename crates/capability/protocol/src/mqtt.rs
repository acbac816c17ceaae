//! MQTT 链路。
//!
//! 订阅 `<prefix>/+/+/+/+/+`，把收到的发布折算成串口行格式，
//! 通过内存管道喂给统一连接循环；出站侧按主题编码直接发布。
//! broker 客户端与事件循环由调用方构造后注入，一个句柄只支持
//! 一轮打开/关闭（rumqttc 的事件循环被读泵消费后无法归还）。

use crate::error::ProtocolError;
use crate::link::{GatewayLink, LinkChannels, MessageWriter};
use async_trait::async_trait;
use domain::{mqtt_topic_suffix, parse_mqtt, serialize, Message};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const EVENT_LOOP_RETRY: Duration = Duration::from_secs(2);

/// MQTT 链路配置与句柄。
pub struct MqttLink {
    client: AsyncClient,
    event_loop: Option<EventLoop>,
    topic_prefix: String,
    pump_task: Option<JoinHandle<()>>,
}

impl MqttLink {
    pub fn new(client: AsyncClient, event_loop: EventLoop, topic_prefix: impl Into<String>) -> Self {
        Self {
            client,
            event_loop: Some(event_loop),
            topic_prefix: topic_prefix.into(),
            pump_task: None,
        }
    }
}

#[async_trait]
impl GatewayLink for MqttLink {
    async fn open(&mut self) -> Result<LinkChannels, ProtocolError> {
        let mut event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| ProtocolError::Connection("mqtt event loop already consumed".into()))?;

        let filter = format!("{}/+/+/+/+/+", self.topic_prefix);
        self.client.subscribe(&filter, QoS::AtLeastOnce).await?;
        info!(filter = %filter, "mqtt subscription requested");

        let (mut pump_in, pump_out) = tokio::io::duplex(4096);
        let prefix = self.topic_prefix.clone();
        self.pump_task = Some(tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt broker session established");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let suffix = publish
                            .topic
                            .strip_prefix(prefix.as_str())
                            .unwrap_or(&publish.topic);
                        let payload = String::from_utf8_lossy(&publish.payload);
                        match parse_mqtt(suffix, &payload) {
                            Ok(msg) => {
                                let line = serialize(&msg);
                                if pump_in.write_all(line.as_bytes()).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                sensornet_telemetry::record_parse_failure();
                                warn!(topic = %publish.topic, error = %err, "dropping unparsable publish");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "mqtt connection error, retrying");
                        tokio::time::sleep(EVENT_LOOP_RETRY).await;
                    }
                }
            }
        }));

        Ok(LinkChannels {
            reader: Box::new(pump_out),
            writer: Box::new(MqttWriter {
                client: self.client.clone(),
                topic_prefix: self.topic_prefix.clone(),
            }),
        })
    }

    async fn close(&mut self, _hard: bool) {
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
        if let Err(err) = self.client.disconnect().await {
            warn!(error = %err, "mqtt disconnect failed");
        }
        info!("mqtt gateway disconnected");
    }
}

/// MQTT 出站写出端：`<prefix>/<node>/<child>/<type>/<ack>/<subtype>`，负载为消息体。
struct MqttWriter {
    client: AsyncClient,
    topic_prefix: String,
}

#[async_trait]
impl MessageWriter for MqttWriter {
    async fn write_message(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        let topic = format!("{}/{}", self.topic_prefix, mqtt_topic_suffix(msg));
        self.client
            .publish(topic, QoS::AtLeastOnce, false, msg.payload.as_bytes())
            .await?;
        Ok(())
    }
}
