//! 桥接进程运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 传输方式与链路参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Serial {
        port: String,
        baud_rate: u32,
    },
    Tcp {
        host: String,
        port: u16,
    },
    Mqtt {
        host: String,
        port: u16,
        client_id: String,
        topic_prefix: String,
        username: Option<String>,
        password: Option<String>,
    },
}

/// 健康巡检配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanityCheckConfig {
    pub interval_minutes: u64,
    pub link_attempts_before_disconnect: u32,
    pub heartbeat_enabled: bool,
    pub heartbeat_misses_before_unreachable: u32,
}

/// 桥接进程运行配置。
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub transport: TransportConfig,
    /// 两次出站写之间的最小间隔（毫秒）
    pub send_delay_ms: u64,
    /// I_CONFIG 应答的单位制（true 为英制）
    pub imperial_units: bool,
    /// 连接建立后是否立即发版本探测
    pub startup_probe: bool,
    /// ID 缓存文件路径
    pub id_cache_path: String,
    /// 巡检配置，None 表示不启用
    pub sanity: Option<SanityCheckConfig>,
}

impl BridgeConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let transport = match env::var("SENSORNET_TRANSPORT")
            .map_err(|_| ConfigError::Missing("SENSORNET_TRANSPORT".to_string()))?
            .to_ascii_lowercase()
            .as_str()
        {
            "serial" => TransportConfig::Serial {
                port: env::var("SENSORNET_SERIAL_PORT")
                    .map_err(|_| ConfigError::Missing("SENSORNET_SERIAL_PORT".to_string()))?,
                baud_rate: read_u32_with_default("SENSORNET_SERIAL_BAUD", 115_200)?,
            },
            "tcp" => TransportConfig::Tcp {
                host: env::var("SENSORNET_TCP_HOST")
                    .map_err(|_| ConfigError::Missing("SENSORNET_TCP_HOST".to_string()))?,
                port: read_u16_with_default("SENSORNET_TCP_PORT", 5003)?,
            },
            "mqtt" => TransportConfig::Mqtt {
                host: env::var("SENSORNET_MQTT_HOST")
                    .unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: read_u16_with_default("SENSORNET_MQTT_PORT", 1883)?,
                client_id: env::var("SENSORNET_MQTT_CLIENT_ID")
                    .unwrap_or_else(|_| "sensornet-bridge".to_string()),
                topic_prefix: env::var("SENSORNET_MQTT_TOPIC_PREFIX")
                    .unwrap_or_else(|_| "sensornet".to_string()),
                username: read_optional("SENSORNET_MQTT_USERNAME"),
                password: read_optional("SENSORNET_MQTT_PASSWORD"),
            },
            other => {
                return Err(ConfigError::Invalid(
                    "SENSORNET_TRANSPORT".to_string(),
                    other.to_string(),
                ))
            }
        };

        let send_delay_ms = read_u64_with_default("SENSORNET_SEND_DELAY_MS", 200)?;
        let imperial_units = read_bool_with_default("SENSORNET_IMPERIAL", false);
        let startup_probe = read_bool_with_default("SENSORNET_STARTUP_PROBE", true);
        let id_cache_path = env::var("SENSORNET_ID_CACHE")
            .unwrap_or_else(|_| "given_ids.json".to_string());

        let sanity = if read_bool_with_default("SENSORNET_SANITY_ENABLED", false) {
            Some(SanityCheckConfig {
                interval_minutes: read_u64_with_default("SENSORNET_SANITY_INTERVAL_MIN", 3)?,
                link_attempts_before_disconnect: read_u32_with_default(
                    "SENSORNET_SANITY_LINK_ATTEMPTS",
                    3,
                )?,
                heartbeat_enabled: read_bool_with_default("SENSORNET_SANITY_HEARTBEAT", false),
                heartbeat_misses_before_unreachable: read_u32_with_default(
                    "SENSORNET_SANITY_HEARTBEAT_MISSES",
                    3,
                )?,
            })
        } else {
            None
        };

        Ok(Self {
            transport,
            send_delay_ms,
            imperial_units,
            startup_probe,
            id_cache_path,
            sanity,
        })
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
