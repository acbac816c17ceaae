//! 追踪初始化与基础指标。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub parse_failures: u64,
    pub dropped_unreachable: u64,
    pub reverts: u64,
    pub ids_reserved: u64,
    pub sanity_disconnects: u64,
    pub reconnects: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    parse_failures: AtomicU64,
    dropped_unreachable: AtomicU64,
    reverts: AtomicU64,
    ids_reserved: AtomicU64,
    sanity_disconnects: AtomicU64,
    reconnects: AtomicU64,
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            dropped_unreachable: AtomicU64::new(0),
            reverts: AtomicU64::new(0),
            ids_reserved: AtomicU64::new(0),
            sanity_disconnects: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            dropped_unreachable: self.dropped_unreachable.load(Ordering::Relaxed),
            reverts: self.reverts.load(Ordering::Relaxed),
            ids_reserved: self.ids_reserved.load(Ordering::Relaxed),
            sanity_disconnects: self.sanity_disconnects.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录入站消息解析成功次数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录出站消息写出次数。
pub fn record_message_sent() {
    metrics().messages_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录入站行解析失败次数。
pub fn record_parse_failure() {
    metrics().parse_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录因节点不可达被丢弃的状态写入次数。
pub fn record_dropped_unreachable() {
    metrics().dropped_unreachable.fetch_add(1, Ordering::Relaxed);
}

/// 记录无 ack 回退次数。
pub fn record_revert() {
    metrics().reverts.fetch_add(1, Ordering::Relaxed);
}

/// 记录 ID 预留次数。
pub fn record_id_reserved() {
    metrics().ids_reserved.fetch_add(1, Ordering::Relaxed);
}

/// 记录巡检触发的硬断开次数。
pub fn record_sanity_disconnect() {
    metrics().sanity_disconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接重建次数。
pub fn record_reconnect() {
    metrics().reconnects.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_snapshot() {
        record_message_received();
        record_message_received();
        record_parse_failure();
        let snapshot = metrics().snapshot();
        assert!(snapshot.messages_received >= 2);
        assert!(snapshot.parse_failures >= 1);
    }
}
