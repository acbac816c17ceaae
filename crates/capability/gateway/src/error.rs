//! 网关错误类型定义。

use sensornet_protocol::ProtocolError;
use sensornet_registry::RegistryError;

/// 网关操作错误。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 注册表错误
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 传输层错误
    #[error("transport error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 尚未挂接连接
    #[error("gateway has no attached connection")]
    NotAttached,

    /// 锁中毒（持锁线程 panic）
    #[error("gateway lock poisoned")]
    Lock,
}
