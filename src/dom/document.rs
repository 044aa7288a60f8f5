//! 内存文档 - 基础设施层
//!
//! 用 arena 存放节点，只提供核心逻辑用得到的那一小部分 DOM 能力：
//! 按 id 查找、遍历子节点、属性与内联样式、按 class 查询后代、深拷贝、
//! 移除与追加、文本节点读写。
//!
//! 节点一旦创建就不会被回收，`remove` 只是把节点从父节点上摘下，
//! 所以被摘下的 `NodeId` 之后依旧可以访问（对应浏览器里"脱离文档但仍被引用"的节点）。

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::dom::snapshot::NodeSnapshot;

/// 节点句柄
///
/// 只在创建它的 `Document` 内有效，不拥有节点本身。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 文档操作错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("节点不存在: {0}")]
    UnknownNode(NodeId),
    #[error("节点 {0} 不是元素")]
    NotAnElement(NodeId),
    #[error("节点 {0} 不是文本节点")]
    NotText(NodeId),
    #[error("不能把节点 {child} 插入到它自己或它的后代 {parent} 之下")]
    HierarchyRequest { parent: NodeId, child: NodeId },
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
    /// `clone_deep` 产生的节点记录它的来源
    source: Option<NodeId>,
}

/// 内存文档
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// 创建只有一个 `BODY` 的空文档
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: NodeId(0),
        };
        doc.body = doc.create_element("body");
        doc
    }

    /// 从快照构建文档，快照的根会挂在 `BODY` 下
    pub fn from_snapshot(snapshot: &NodeSnapshot) -> Result<Self, DomError> {
        let mut doc = Self::new();
        let body = doc.body;
        doc.load_snapshot(body, snapshot)?;
        Ok(doc)
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // ========== 创建 ==========

    /// 创建脱离文档的元素，标签名统一为大写（与浏览器的 `tagName` 一致）
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_ascii_uppercase(),
            attrs: BTreeMap::new(),
        })
    }

    /// 创建脱离文档的文本节点
    pub fn create_text(&mut self, data: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(data.into()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
            source: None,
        });
        id
    }

    /// 把快照挂到 `parent` 下，返回快照根对应的节点
    pub fn load_snapshot(
        &mut self,
        parent: NodeId,
        snapshot: &NodeSnapshot,
    ) -> Result<NodeId, DomError> {
        let id = match snapshot {
            NodeSnapshot::Text { text } => self.create_text(text.clone()),
            NodeSnapshot::Element {
                tag,
                attrs,
                children,
            } => {
                let id = self.create_element(tag);
                for (name, value) in attrs {
                    self.set_attribute(id, name, value)?;
                }
                for child in children {
                    self.load_snapshot(id, child)?;
                }
                id
            }
        };
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// 导出节点快照
    pub fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let node = self.nodes.get(id.0)?;
        Some(match &node.data {
            NodeData::Text(text) => NodeSnapshot::Text { text: text.clone() },
            NodeData::Element { tag, attrs } => NodeSnapshot::Element {
                tag: tag.to_ascii_lowercase(),
                attrs: attrs.clone(),
                children: node
                    .children
                    .iter()
                    .filter_map(|child| self.snapshot(*child))
                    .collect(),
            },
        })
    }

    // ========== 结构 ==========

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    /// 只包含元素的子节点（对应 `element.children`）
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.is_element(*child))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|n| &n.data),
            Some(NodeData::Element { .. })
        )
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0).map(|n| &n.data), Some(NodeData::Text(_)))
    }

    /// 把 `child` 追加为 `parent` 的最后一个子节点，`child` 原来有父节点时会先被摘下
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !self.is_element(parent) {
            self.node(parent)?;
            return Err(DomError::NotAnElement(parent));
        }
        self.node(child)?;

        let mut ancestor = Some(parent);
        while let Some(node) = ancestor {
            if node == child {
                return Err(DomError::HierarchyRequest { parent, child });
            }
            ancestor = self.parent(node);
        }

        self.remove(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// 按顺序追加多个子节点（对应 `element.append(...nodes)`）
    pub fn append_children(
        &mut self,
        parent: NodeId,
        children: &[NodeId],
    ) -> Result<(), DomError> {
        for child in children {
            self.append_child(parent, *child)?;
        }
        Ok(())
    }

    /// 把节点从父节点上摘下，没有父节点时什么也不做
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        if let Some(parent) = self.node(id)?.parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
            self.node_mut(id)?.parent = None;
        }
        Ok(())
    }

    /// 深拷贝节点及其全部后代，拷贝结果不挂在任何父节点下
    pub fn clone_deep(&mut self, id: NodeId) -> Result<NodeId, DomError> {
        let data = self.node(id)?.data.clone();
        let children = self.node(id)?.children.clone();
        let copy = self.push(data);
        self.node_mut(copy)?.source = Some(id);
        for child in children {
            let child_copy = self.clone_deep(child)?;
            self.node_mut(child_copy)?.parent = Some(copy);
            self.node_mut(copy)?.children.push(child_copy);
        }
        Ok(copy)
    }

    /// 拷贝的来源节点，不是拷贝出来的节点返回 `None`
    pub fn cloned_from(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.source)
    }

    // ========== 元素 ==========

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    fn attrs_mut(&mut self, id: NodeId) -> Result<&mut BTreeMap<String, String>, DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element { attrs, .. } => Ok(attrs),
            NodeData::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        self.attrs_mut(id)?.insert(name.to_string(), value.into());
        Ok(())
    }

    /// 删除属性，返回原来的值
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>, DomError> {
        Ok(self.attrs_mut(id)?.remove(name))
    }

    /// 读取内联样式中的某个属性
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attribute(id, "style")?;
        parse_style(style)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// 设置内联样式中的某个属性（对应 `element.style.xxx = value`）
    pub fn set_style_property(
        &mut self,
        id: NodeId,
        property: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let mut declarations = self
            .attribute(id, "style")
            .map(parse_style)
            .unwrap_or_default();
        match declarations.iter_mut().find(|(name, _)| name == property) {
            Some(existing) => existing.1 = value.to_string(),
            None => declarations.push((property.to_string(), value.to_string())),
        }
        let style = declarations
            .iter()
            .map(|(name, value)| format!("{}: {};", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(id, "style", style)
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// 按文档顺序查找第一个带有 `class` 的后代元素，不包含节点自身
    /// （对应 `element.querySelector('.class')`）
    pub fn query_class(&self, id: NodeId, class: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|node| self.has_class(*node, class))
    }

    /// 在文档树中按 `id` 属性查找元素
    pub fn element_by_id(&self, element_id: &str) -> Option<NodeId> {
        std::iter::once(self.body)
            .chain(self.descendants(self.body))
            .find(|node| self.attribute(*node, "id") == Some(element_id))
    }

    /// 先序遍历的全部后代
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    // ========== 文本 ==========

    /// 文本节点的字符数据
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Text(data) => Some(data),
            NodeData::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, data: impl Into<String>) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(text) => {
                *text = data.into();
                Ok(())
            }
            NodeData::Element { .. } => Err(DomError::NotText(id)),
        }
    }

    /// 全部后代文本拼接（对应 `textContent`）
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(doc: &mut Document, parent: NodeId, text: &str) -> NodeId {
        let p = doc.create_element("p");
        let t = doc.create_text(text);
        doc.append_child(p, t).unwrap();
        doc.append_child(parent, p).unwrap();
        p
    }

    #[test]
    fn test_tag_names_are_uppercase() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        assert_eq!(doc.tag_name(p), Some("P"));
        assert_eq!(doc.tag_name(doc.body()), Some("BODY"));
    }

    #[test]
    fn test_append_moves_node_between_parents() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_children(doc.body(), &[a, b]).unwrap();
        let p = paragraph(&mut doc, a, "あ");

        doc.append_child(b, p).unwrap();

        assert!(doc.children(a).is_empty());
        assert_eq!(doc.children(b), &[p]);
        assert_eq!(doc.parent(p), Some(b));
    }

    #[test]
    fn test_append_rejects_cycles() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();

        assert_eq!(
            doc.append_child(inner, outer),
            Err(DomError::HierarchyRequest {
                parent: inner,
                child: outer
            })
        );
    }

    #[test]
    fn test_clone_deep_is_detached_copy() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = paragraph(&mut doc, body, "テスト");
        doc.set_attribute(p, "class", "line").unwrap();

        let copy = doc.clone_deep(p).unwrap();

        assert_ne!(copy, p);
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.cloned_from(copy), Some(p));
        assert_eq!(doc.cloned_from(p), None);
        assert!(doc.has_class(copy, "line"));
        let text = doc.first_child(copy).unwrap();
        assert_ne!(Some(text), doc.first_child(p));
        doc.set_text(text, "変更").unwrap();
        assert_eq!(doc.text_content(p), "テスト");
        assert_eq!(doc.text_content(copy), "変更");
    }

    #[test]
    fn test_query_class_skips_self() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = paragraph(&mut doc, body, "あ");
        doc.set_attribute(p, "class", "jpdb-word").unwrap();
        assert_eq!(doc.query_class(p, "jpdb-word"), None);

        let span = doc.create_element("span");
        doc.set_attribute(span, "class", "x jpdb-word").unwrap();
        doc.append_child(p, span).unwrap();
        assert_eq!(doc.query_class(p, "jpdb-word"), Some(span));
    }

    #[test]
    fn test_style_property_round_trip() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_attribute(p, "style", "color: red;").unwrap();
        doc.set_style_property(p, "display", "none").unwrap();

        assert_eq!(doc.style_property(p, "display").as_deref(), Some("none"));
        assert_eq!(doc.attribute(p, "style"), Some("color: red; display: none;"));

        doc.remove_attribute(p, "style").unwrap();
        assert_eq!(doc.style_property(p, "display"), None);
    }

    #[test]
    fn test_element_by_id_ignores_detached_nodes() {
        let mut doc = Document::new();
        let panel = doc.create_element("div");
        doc.set_attribute(panel, "id", "manga-panel").unwrap();
        assert_eq!(doc.element_by_id("manga-panel"), None);

        doc.append_child(doc.body(), panel).unwrap();
        assert_eq!(doc.element_by_id("manga-panel"), Some(panel));
    }

    #[test]
    fn test_set_text_on_element_fails() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        assert_eq!(doc.set_text(p, "x"), Err(DomError::NotText(p)));
    }
}
