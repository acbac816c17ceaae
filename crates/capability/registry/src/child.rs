//! 子设备：节点上的一个逻辑传感器/执行器。

use crate::variable::Variable;
use domain::{PresentationCode, VariableKind};
use std::collections::HashMap;

/// 子设备级配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildConfig {
    /// 出站 SET 是否请求 ack
    pub request_ack: bool,
    /// 无 ack 时是否回退变量
    pub revert_on_no_ack: bool,
    /// 目标是否为 smart-sleep 设备
    pub smart_sleep: bool,
    /// 期望更新窗口（分钟），0 及以下表示未设置
    pub expect_update_timeout: i64,
}

impl Default for ChildConfig {
    fn default() -> Self {
        Self {
            request_ack: false,
            revert_on_no_ack: true,
            smart_sleep: false,
            expect_update_timeout: -1,
        }
    }
}

impl ChildConfig {
    /// 合并策略：布尔取逻辑或，窗口仅在未设置时补齐。
    pub fn merge(&mut self, other: &ChildConfig) {
        self.request_ack |= other.request_ack;
        self.revert_on_no_ack |= other.revert_on_no_ack;
        self.smart_sleep |= other.smart_sleep;
        if self.expect_update_timeout <= 0 {
            self.expect_update_timeout = other.expect_update_timeout;
        }
    }
}

/// 子设备。
///
/// 任何类别的新建子设备都携带五个通用槽位（V_VAR1..V_VAR5），
/// 再加上类别声明的槽位（见 [`PresentationCode::variables`]）。
#[derive(Debug, Clone, PartialEq)]
pub struct Child {
    child_id: u8,
    presentation: Option<PresentationCode>,
    variables: HashMap<u8, Variable>,
    config: ChildConfig,
    last_update: i64,
}

impl Child {
    pub fn new(child_id: u8) -> Self {
        let mut child = Self {
            child_id,
            presentation: None,
            variables: HashMap::new(),
            config: ChildConfig::default(),
            last_update: 0,
        };
        for kind in VariableKind::COMMON {
            child.add_variable(kind);
        }
        child
    }

    /// 从设备类别构造：通用槽位 + 类别槽位。
    pub fn from_presentation(code: PresentationCode, child_id: u8) -> Self {
        let mut child = Self::new(child_id);
        child.presentation = Some(code);
        for kind in code.variables() {
            child.add_variable(*kind);
        }
        child
    }

    pub fn child_id(&self) -> u8 {
        self.child_id
    }

    pub fn presentation(&self) -> Option<PresentationCode> {
        self.presentation
    }

    pub fn config(&self) -> &ChildConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ChildConfig) {
        self.config = config;
    }

    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.last_update = now_ms;
    }

    /// 添加一个变量槽位，已存在则保持原状态不覆盖。
    pub fn add_variable(&mut self, kind: VariableKind) {
        self.variables
            .entry(kind.code())
            .or_insert_with(|| Variable::new(kind));
    }

    pub fn variable(&self, subtype: u8) -> Option<&Variable> {
        self.variables.get(&subtype)
    }

    pub fn variable_mut(&mut self, subtype: u8) -> Option<&mut Variable> {
        self.variables.get_mut(&subtype)
    }

    /// 合并另一个同 ID 子设备：配置取并，变量槽位补齐（不覆盖已有状态）。
    pub fn merge(&mut self, other: Child) {
        self.config.merge(&other.config);
        if self.presentation.is_none() {
            self.presentation = other.presentation;
        }
        for (code, variable) in other.variables {
            self.variables.entry(code).or_insert(variable);
        }
    }
}
