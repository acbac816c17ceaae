//! 传输层错误类型定义。

/// 传输层错误。
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 底层 IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 串口错误
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// MQTT 客户端错误
    #[error("mqtt client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// 链路状态错误（重复打开、已消费的事件循环等）
    #[error("connection error: {0}")]
    Connection(String),

    /// 出站队列已关闭（连接未建立或已断开）
    #[error("send queue closed")]
    QueueClosed,
}
