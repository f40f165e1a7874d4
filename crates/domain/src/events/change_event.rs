//! 变更事件
//!
//! 捕获源检测到的一次数据变更的规范化描述。在解析阶段即确定操作类型，
//! 下游通过对 [`OperationKind`] 的穷尽匹配分发，不做运行时类型判断。

use serde::{Deserialize, Serialize};

use crate::entities::LineRecord;
use crate::errors::{DomainError, DomainResult};
use crate::value_objects::LineId;

/// 变更操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

/// 变更事件
///
/// 不变量：
/// - `Delete`：`payload` 为空，`affected_ids` 非空；
/// - `Insert` / `Update`：`payload` 为 `affected_ids` 中每个标识对应的当前行镜像。
///
/// 字段私有，只能通过构造函数创建，保证不变量成立。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    operation_kind: OperationKind,
    affected_ids: Vec<LineId>,
    payload: Vec<LineRecord>,
    #[serde(skip)]
    full_set: bool,
}

impl ChangeEvent {
    /// 删除事件：只携带受影响的标识。
    pub fn deleted(affected_ids: Vec<LineId>) -> DomainResult<Self> {
        if affected_ids.is_empty() {
            return Err(DomainError::invalid_change_event(
                "删除事件必须至少包含一个受影响标识",
            ));
        }

        Ok(Self {
            operation_kind: OperationKind::Delete,
            affected_ids,
            payload: Vec::new(),
            full_set: false,
        })
    }

    /// 插入/更新事件：受影响标识由行镜像推导。
    pub fn upserted(operation_kind: OperationKind, payload: Vec<LineRecord>) -> DomainResult<Self> {
        if operation_kind == OperationKind::Delete {
            return Err(DomainError::invalid_change_event(
                "删除事件不能携带行镜像",
            ));
        }

        let affected_ids = payload.iter().map(|record| record.id).collect();

        Ok(Self {
            operation_kind,
            affected_ids,
            payload,
            full_set: false,
        })
    }

    /// 插入事件
    pub fn inserted(payload: Vec<LineRecord>) -> Self {
        let affected_ids = payload.iter().map(|record| record.id).collect();
        Self {
            operation_kind: OperationKind::Insert,
            affected_ids,
            payload,
            full_set: false,
        }
    }

    /// 更新事件
    pub fn updated(payload: Vec<LineRecord>) -> Self {
        let affected_ids = payload.iter().map(|record| record.id).collect();
        Self {
            operation_kind: OperationKind::Update,
            affected_ids,
            payload,
            full_set: false,
        }
    }

    /// 全量刷新事件：`payload` 是当前的完整集合，可能为空
    pub fn refreshed(payload: Vec<LineRecord>) -> Self {
        Self {
            full_set: true,
            ..Self::updated(payload)
        }
    }

    pub fn operation_kind(&self) -> OperationKind {
        self.operation_kind
    }

    pub fn affected_ids(&self) -> &[LineId] {
        &self.affected_ids
    }

    pub fn payload(&self) -> &[LineRecord] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<LineRecord> {
        self.payload
    }

    /// 是否为完整集合；为 `true` 时空载荷表示集合已被清空
    pub fn is_full_set(&self) -> bool {
        self.full_set
    }

    pub fn is_empty(&self) -> bool {
        self.affected_ids.is_empty()
    }
}
