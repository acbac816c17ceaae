//! 传输能力：串口 / TCP / MQTT 链路与统一连接循环。
//!
//! 每种传输实现 [`GatewayLink`]，把自己折算成"按行吐报文的字节流 +
//! 消息写出端"；[`Connection`] 在其上跑唯一的一套读写任务。

mod connection;
mod error;
mod link;
mod mqtt;
mod serial;
mod tcp;

pub use connection::{Connection, InboundHandler, LinkState};
pub use error::ProtocolError;
pub use link::{GatewayLink, LineWriter, LinkChannels, MessageWriter};
pub use mqtt::MqttLink;
pub use serial::SerialLink;
pub use tcp::TcpLink;
