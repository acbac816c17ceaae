//! 桥接守护进程：装配链路、注册表、网关与监听者，跑到收到退出信号。

use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions};
use sensornet_config::{BridgeConfig, TransportConfig};
use sensornet_gateway::{
    EventRegister, GatewayEvent, GatewayEventListener, GatewayOptions, SanityOptions,
    SensorGateway,
};
use sensornet_protocol::{Connection, GatewayLink, InboundHandler, MqttLink, SerialLink, TcpLink};
use sensornet_registry::{IdCache, SensorRegistry};
use sensornet_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "bridge exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = BridgeConfig::from_env()?;

    // 从缓存文件恢复历史上分配过的节点 ID
    let cache = IdCache::new(&config.id_cache_path);
    let cached_ids = cache.load()?;
    info!(count = cached_ids.len(), "restored cached node ids");
    let registry = Arc::new(SensorRegistry::from_ids(&cached_ids));
    let events = Arc::new(EventRegister::new());

    let options = GatewayOptions {
        imperial_units: config.imperial_units,
        startup_probe: config.startup_probe,
        sanity: config.sanity.map(|sanity| SanityOptions {
            interval_minutes: sanity.interval_minutes,
            link_attempts_before_disconnect: sanity.link_attempts_before_disconnect,
            heartbeat_enabled: sanity.heartbeat_enabled,
            heartbeat_misses_before_unreachable: sanity.heartbeat_misses_before_unreachable,
        }),
    };
    let gateway = Arc::new(SensorGateway::new(
        Arc::clone(&registry),
        Arc::clone(&events),
        options,
    ));

    events
        .subscribe(Arc::new(CacheWriter {
            registry: Arc::clone(&registry),
            cache,
        }))
        .await;
    events.subscribe(Arc::new(LogListener)).await;

    let link = build_link(&config.transport);
    let connection = Connection::new(
        link,
        Arc::clone(&gateway) as Arc<dyn InboundHandler>,
        Duration::from_millis(config.send_delay_ms),
    );
    gateway.attach_connection(connection);
    gateway.startup().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    gateway.shutdown().await;
    Ok(())
}

fn build_link(transport: &TransportConfig) -> Box<dyn GatewayLink> {
    match transport {
        TransportConfig::Serial { port, baud_rate } => {
            Box::new(SerialLink::new(port, *baud_rate))
        }
        TransportConfig::Tcp { host, port } => Box::new(TcpLink::new(host, *port)),
        TransportConfig::Mqtt {
            host,
            port,
            client_id,
            topic_prefix,
            username,
            password,
        } => {
            let mut mqtt_options = MqttOptions::new(client_id, host, *port);
            mqtt_options.set_keep_alive(Duration::from_secs(30));
            if let (Some(username), Some(password)) = (username, password) {
                mqtt_options.set_credentials(username, password);
            }
            // broker 句柄在这里构造后注入链路
            let (client, event_loop) = AsyncClient::new(mqtt_options, 64);
            Box::new(MqttLink::new(client, event_loop, topic_prefix))
        }
    }
}

/// 在 ID 预留、节点发现、连接状态变化后整体重写 ID 缓存文件。
struct CacheWriter {
    registry: Arc<SensorRegistry>,
    cache: IdCache,
}

#[async_trait]
impl GatewayEventListener for CacheWriter {
    async fn on_event(&self, event: &GatewayEvent) {
        let rewrite = matches!(
            event,
            GatewayEvent::IdReserved { .. }
                | GatewayEvent::NodeDiscovered { .. }
                | GatewayEvent::ConnectionStatus { .. }
        );
        if !rewrite {
            return;
        }
        match self.registry.node_ids() {
            Ok(ids) => {
                if let Err(err) = self.cache.store(&ids) {
                    warn!(error = %err, "failed to rewrite id cache");
                }
            }
            Err(err) => warn!(error = %err, "failed to read registry for id cache"),
        }
    }
}

/// 把网关事件落到日志里。
struct LogListener;

#[async_trait]
impl GatewayEventListener for LogListener {
    async fn on_event(&self, event: &GatewayEvent) {
        match event {
            GatewayEvent::ConnectionStatus { connected } => {
                info!(connected, "gateway connection status")
            }
            GatewayEvent::NodeDiscovered { node_id, child_id } => {
                info!(node_id, ?child_id, "discovered")
            }
            GatewayEvent::NodeReachability { node_id, reachable } => {
                info!(node_id, reachable, "reachability changed")
            }
            GatewayEvent::IdReserved { node_id } => info!(node_id, "id reserved"),
            GatewayEvent::VariableUpdated {
                node_id,
                child_id,
                subtype,
            } => debug!(node_id, child_id, subtype, "variable updated"),
            GatewayEvent::VariableReverted {
                node_id,
                child_id,
                subtype,
            } => warn!(node_id, child_id, subtype, "variable reverted"),
            GatewayEvent::BatteryUpdated { node_id, percent } => {
                debug!(node_id, percent, "battery updated")
            }
            GatewayEvent::MessageReceived(_) => {}
        }
    }
}
