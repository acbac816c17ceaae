//! 注册表错误类型定义。

/// 注册表操作错误。
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 锁中毒（持锁线程 panic）
    #[error("registry lock poisoned")]
    Lock,

    /// 非法节点 ID（255 为广播保留地址）
    #[error("invalid node id: {0}")]
    InvalidNodeId(u8),

    /// [1, 254] 区间已无空闲 ID
    #[error("no more free node ids")]
    IdsExhausted,

    /// 节点不存在
    #[error("unknown node: {0}")]
    UnknownNode(u8),

    /// 子设备不存在
    #[error("unknown child {child} on node {node}")]
    UnknownChild { node: u8, child: u8 },

    /// 变量槽位不存在
    #[error("unknown variable {subtype} on node {node}, child {child}")]
    UnknownVariable { node: u8, child: u8, subtype: u8 },

    /// 变量没有可回退的历史状态
    #[error("variable has no previous state to revert")]
    NotRevertible,

    /// 合并契约违例（例如两个不同 ID 的节点）
    #[error("merge error: {0}")]
    Merge(String),

    /// 缓存文件 IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 缓存文件解析错误
    #[error("cache parse error: {0}")]
    Cache(#[from] serde_json::Error),
}
