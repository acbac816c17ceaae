//! 已分配节点 ID 的磁盘缓存。
//!
//! 文件内容是一个 JSON 数组（例如 `[1,4,7]`），重启后据此恢复裸节点，
//! 避免把已发出去的 ID 再次分配给新设备。

use crate::RegistryError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// ID 缓存文件句柄。
pub struct IdCache {
    path: PathBuf,
}

impl IdCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取缓存。文件不存在视为空列表，不算错误。
    pub fn load(&self) -> Result<Vec<u8>, RegistryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let ids: Vec<u8> = serde_json::from_str(&raw)?;
                debug!(count = ids.len(), "loaded cached node ids");
                Ok(ids)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// 整体重写缓存文件。
    pub fn store(&self, ids: &[u8]) -> Result<(), RegistryError> {
        let raw = serde_json::to_string(ids)?;
        std::fs::write(&self.path, raw)?;
        debug!(count = ids.len(), "stored cached node ids");
        Ok(())
    }
}
