//! 变更记录

use crate::dom::NodeId;

/// 变更类型（对应 `MutationRecord.type`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Attributes,
    ChildList,
    CharacterData,
}

/// 一条 DOM 变更记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    /// 发生变更的节点
    pub target: NodeId,
    /// 属性变更时的属性名
    pub attribute_name: Option<String>,
}

impl MutationRecord {
    pub fn attributes(target: NodeId, attribute_name: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            target,
            attribute_name: Some(attribute_name.into()),
        }
    }

    pub fn child_list(target: NodeId) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            attribute_name: None,
        }
    }

    pub fn is_attributes(&self) -> bool {
        self.kind == MutationKind::Attributes
    }
}
