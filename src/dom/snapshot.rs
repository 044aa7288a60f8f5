//! 页面子树快照
//!
//! 浏览器端用 JS 把子树序列化成 JSON，Rust 端再还原成 `Document`。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 单个节点的快照
///
/// 文本节点序列化为 `{"text": "..."}`，元素序列化为
/// `{"tag": "p", "attrs": {...}, "children": [...]}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSnapshot {
    Text {
        text: String,
    },
    Element {
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<NodeSnapshot>,
    },
}

impl NodeSnapshot {
    pub fn text(text: impl Into<String>) -> Self {
        NodeSnapshot::Text { text: text.into() }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        NodeSnapshot::Element {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// 追加属性（文本节点上调用时忽略）
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let NodeSnapshot::Element { attrs, .. } = &mut self {
            attrs.insert(name.into(), value.into());
        }
        self
    }

    /// 追加子节点（文本节点上调用时忽略）
    pub fn with_child(mut self, child: NodeSnapshot) -> Self {
        if let NodeSnapshot::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }
}
