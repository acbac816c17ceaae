//! 串口链路。
//!
//! 8 个数据位、无校验、1 个停止位。硬断开时重开端口打一个 DTR 脉冲，
//! 让基于 Arduino 的网关固件复位重启。

use crate::error::ProtocolError;
use crate::link::{GatewayLink, LineWriter, LinkChannels};
use async_trait::async_trait;
use std::time::Duration;
use tokio_serial::{DataBits, Parity, SerialPort, SerialPortBuilderExt, StopBits};
use tracing::{info, warn};

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const DTR_RESET_HOLD: Duration = Duration::from_millis(500);

/// 串口链路配置与句柄。
pub struct SerialLink {
    path: String,
    baud_rate: u32,
}

impl SerialLink {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

#[async_trait]
impl GatewayLink for SerialLink {
    async fn open(&mut self) -> Result<LinkChannels, ProtocolError> {
        let stream = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open_native_async()?;
        info!(path = %self.path, baud = self.baud_rate, "serial port opened");
        let (read_half, write_half) = tokio::io::split(stream);
        Ok(LinkChannels {
            reader: Box::new(read_half),
            writer: Box::new(LineWriter::new(write_half)),
        })
    }

    async fn close(&mut self, hard: bool) {
        // 读写两半随任务一起被丢弃，端口此时已释放
        if hard {
            if let Err(err) = pulse_dtr(&self.path, self.baud_rate).await {
                warn!(path = %self.path, error = %err, "failed to reset gateway via dtr");
            }
        }
        info!(path = %self.path, "serial port closed");
    }
}

/// 重开端口并拉高再放下 DTR，触发固件复位。
async fn pulse_dtr(path: &str, baud_rate: u32) -> Result<(), ProtocolError> {
    let mut port = tokio_serial::new(path, baud_rate).open_native_async()?;
    port.write_data_terminal_ready(true)?;
    tokio::time::sleep(DTR_RESET_HOLD).await;
    port.write_data_terminal_ready(false)?;
    info!(path = %path, "gateway reset pulse sent");
    Ok(())
}
