//! 链路抽象：连接循环与具体传输之间的接缝。
//!
//! 三种传输（串口 / TCP / MQTT）都折算成同一种形态：
//! 一个按行吐出串口格式报文的字节流，加一个消息写出端。
//! 连接循环因此只需要一套读写逻辑。

use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::{serialize, Message};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// 打开链路得到的读写两端。
pub struct LinkChannels {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub writer: Box<dyn MessageWriter>,
}

/// 网关链路。
#[async_trait]
pub trait GatewayLink: Send {
    /// 建立底层连接并返回读写两端。
    async fn open(&mut self) -> Result<LinkChannels, ProtocolError>;

    /// 关闭底层连接。hard 为真时附带传输特定的复位动作
    /// （串口为 DTR 脉冲复位网关固件，其余传输与软关闭相同）。
    async fn close(&mut self, hard: bool);
}

/// 出站消息写出端。
#[async_trait]
pub trait MessageWriter: Send {
    async fn write_message(&mut self, msg: &Message) -> Result<(), ProtocolError>;
}

/// 面向字节流的写出端：按串口行格式序列化后整行写出。
pub struct LineWriter<W> {
    inner: W,
}

impl<W> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W> MessageWriter for LineWriter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn write_message(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        let line = serialize(msg);
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }
}
