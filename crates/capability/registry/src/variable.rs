//! 变量槽位：子设备上一个带时间戳的字符串值。

use crate::now_epoch_ms;
use crate::RegistryError;
use domain::VariableKind;

/// 变量槽位。
///
/// 除当前值外记住*一组*先前状态 `(value, last_update)` 用于无 ack 回退。
/// 回退仅在先前状态存在时合法，且回退会清空先前状态（单级撤销，非栈）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    kind: VariableKind,
    value: Option<String>,
    last_update: i64,
    prior: Option<(String, i64)>,
}

impl Variable {
    pub fn new(kind: VariableKind) -> Self {
        Self {
            kind,
            value: None,
            last_update: 0,
            prior: None,
        }
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// 最近一次更新的 epoch 毫秒时间戳，0 表示从未更新。
    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    /// 写入新值。旧值（若存在）连同其时间戳成为可回退的先前状态。
    pub fn set(&mut self, value: impl Into<String>) {
        self.prior = self.value.take().map(|old| (old, self.last_update));
        self.value = Some(value.into());
        self.last_update = now_epoch_ms();
    }

    pub fn is_revertible(&self) -> bool {
        self.prior.is_some()
    }

    /// 回退到先前状态。仅在先前状态存在时合法，成功后先前状态被清空。
    pub fn revert(&mut self) -> Result<(), RegistryError> {
        match self.prior.take() {
            Some((value, last_update)) => {
                self.value = Some(value);
                self.last_update = last_update;
                Ok(())
            }
            None => Err(RegistryError::NotRevertible),
        }
    }

    /// 刷新时间戳（收到消息但不改值时使用）。
    pub fn touch(&mut self, now_ms: i64) {
        self.last_update = now_ms;
    }
}
