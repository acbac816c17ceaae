//! TCP 链路：连接以太网网关设备。

use crate::error::ProtocolError;
use crate::link::{GatewayLink, LineWriter, LinkChannels};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::info;

/// TCP 链路配置与句柄。
pub struct TcpLink {
    host: String,
    port: u16,
}

impl TcpLink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl GatewayLink for TcpLink {
    async fn open(&mut self) -> Result<LinkChannels, ProtocolError> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = TcpStream::connect(&addr).await?;
        info!(addr = %addr, "tcp gateway connected");
        let (read_half, write_half) = stream.into_split();
        Ok(LinkChannels {
            reader: Box::new(read_half),
            writer: Box::new(LineWriter::new(write_half)),
        })
    }

    async fn close(&mut self, _hard: bool) {
        // 流随读写任务一起被丢弃，无需额外动作
        info!(host = %self.host, port = self.port, "tcp gateway disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, InboundHandler};
    use domain::Message;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Collector {
        messages: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl InboundHandler for Collector {
        async fn message_received(&self, msg: Message) {
            self.messages.lock().await.push(msg);
        }

        async fn connection_status(&self, _connected: bool) {}
    }

    #[tokio::test]
    async fn reads_lines_from_a_loopback_gateway() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            socket
                .write_all(b"0;0;3;0;14;Gateway startup complete.\n")
                .await
                .expect("write");
        });

        let handler = Arc::new(Collector::default());
        let link = TcpLink::new(addr.ip().to_string(), addr.port());
        let mut connection =
            Connection::new(
            Box::new(link),
            Arc::clone(&handler) as Arc<dyn InboundHandler>,
            Duration::ZERO,
        );
        connection.connect().await.expect("connect");

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if !handler.messages.lock().await.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("message should arrive");

        let messages = handler.messages.lock().await;
        assert_eq!(messages[0].node_id, 0);
        assert_eq!(messages[0].payload, "Gateway startup complete.");
    }
}
