//! 页面补丁 - 适配层
//!
//! 核心逻辑只改内存里的快照文档。写回页面时不能整体替换 box 的内容：
//! 阅读器翻页时会继续往原来那批段落节点里写文本，那些节点必须留在页面上。
//! 所以这里对比处理前后的文档，得出针对原节点的操作列表，由页面脚本逐条执行。

use serde::Serialize;

use crate::dom::{Document, NodeId};

/// 对一个 box 内原有子元素的操作
///
/// `index` / `source` 都是处理前该元素在 box 子元素里的下标。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PatchOp {
    /// 设置或删除（`None`）内联样式
    SetStyle { index: usize, style: Option<String> },
    /// 从 box 中移除
    Remove { index: usize },
    /// 深拷贝原元素，替换第一个文本子节点的内容后追加到 box 末尾
    AppendClone {
        source: usize,
        style: Option<String>,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxPatch {
    pub box_index: usize,
    pub ops: Vec<PatchOp>,
}

#[derive(Debug, Clone)]
struct BoxBaseline {
    node: NodeId,
    children: Vec<(NodeId, Option<String>)>,
}

/// 处理前的页面结构：每个 box 的子元素和它们的内联样式
#[derive(Debug, Clone)]
pub struct PageBaseline {
    boxes: Vec<BoxBaseline>,
}

impl PageBaseline {
    pub fn capture(doc: &Document, page: NodeId) -> Self {
        let boxes = doc
            .element_children(page)
            .into_iter()
            .map(|node| BoxBaseline {
                node,
                children: doc
                    .element_children(node)
                    .into_iter()
                    .map(|child| (child, doc.attribute(child, "style").map(str::to_string)))
                    .collect(),
            })
            .collect();
        Self { boxes }
    }

    /// 对比当前文档，得出每个 box 需要执行的操作，没有变化的 box 不出现在结果里
    pub fn diff(&self, doc: &Document) -> Vec<BoxPatch> {
        self.boxes
            .iter()
            .enumerate()
            .filter_map(|(box_index, baseline)| {
                let ops = diff_box(doc, baseline);
                (!ops.is_empty()).then_some(BoxPatch { box_index, ops })
            })
            .collect()
    }
}

fn diff_box(doc: &Document, baseline: &BoxBaseline) -> Vec<PatchOp> {
    let index_of = |node: NodeId| baseline.children.iter().position(|(n, _)| *n == node);
    let style_of = |node: NodeId| doc.attribute(node, "style").map(str::to_string);

    let mut ops = Vec::new();
    for (index, (node, before)) in baseline.children.iter().enumerate() {
        if doc.parent(*node) != Some(baseline.node) {
            ops.push(PatchOp::Remove { index });
            continue;
        }
        let after = style_of(*node);
        if after != *before {
            ops.push(PatchOp::SetStyle { index, style: after });
        }
    }

    for child in doc.element_children(baseline.node) {
        if index_of(child).is_some() {
            continue;
        }
        let Some(source) = doc.cloned_from(child).and_then(index_of) else {
            continue;
        };
        let text = doc
            .first_child(child)
            .and_then(|node| doc.text(node))
            .unwrap_or_default()
            .to_string();
        ops.push(PatchOp::AppendClone {
            source,
            style: style_of(child),
            text,
        });
    }
    ops
}
