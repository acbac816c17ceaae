//! 网络注册表：已知节点树的内存状态。
//!
//! 所有权模型：注册表由网关独占持有，外部组件只通过整数 ID 寻址，
//! 读写都走一把粗粒度锁（预期节点规模为几十个，不追求细粒度并发）。

mod cache;
mod child;
mod error;
mod node;
mod registry;
mod variable;

pub use cache::IdCache;
pub use child::{Child, ChildConfig};
pub use error::RegistryError;
pub use node::{Node, NodeConfig};
pub use registry::{PresentOutcome, SensorRegistry};
pub use variable::Variable;

/// 当前 epoch 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
