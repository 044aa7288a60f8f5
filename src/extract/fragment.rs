//! 文本片段提取
//!
//! 阅读器翻页时会复用已有的文本节点，所以不能直接在原节点上做标注：
//! 原段落保留在原位并隐藏（后续的原位文本替换仍然指向它），
//! 提取和规范化都在它的深拷贝上进行，拷贝最后追加回 box 里显示。
//! 已经带有标注标记的段落说明文本已被上一轮消费过，直接移除。

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::dom::{Document, DomError, NodeId};
use crate::text::normalize;

/// 一段带位置的文本
///
/// `start` / `end` 是在所属 box 内的偏移（UTF-16 码元，与浏览器 DOM 的文本偏移一致），
/// 同一个 box 的片段按文档顺序首尾相接、互不重叠。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// 片段文本所在的文本节点，由文档持有
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    /// 振假名标记，本阅读器不支持，恒为 `false`
    pub has_ruby: bool,
}

/// 提取错误
#[derive(Debug, Error)]
pub enum ExtractError {
    /// 段落的第一个子节点不是文本节点（通常是被标注结果替换过）
    #[error("段落 {paragraph} 没有直接的文本子节点")]
    MissingText { paragraph: NodeId },
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// 片段提取器
#[derive(Debug, Clone)]
pub struct FragmentExtractor {
    paragraph_tag: String,
    annotation_class: String,
}

impl FragmentExtractor {
    /// # 参数
    /// - `paragraph_tag`: 段落元素的标签名（不区分大小写）
    /// - `annotation_class`: 标注结果注入页面时使用的 class
    pub fn new(paragraph_tag: impl Into<String>, annotation_class: impl Into<String>) -> Self {
        Self {
            paragraph_tag: paragraph_tag.into(),
            annotation_class: annotation_class.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.paragraph_tag, &config.annotation_class)
    }

    fn is_paragraph(&self, doc: &Document, node: NodeId) -> bool {
        doc.tag_name(node)
            .map(|tag| tag.eq_ignore_ascii_case(&self.paragraph_tag))
            .unwrap_or(false)
    }

    /// 提取一个 box 的片段序列
    pub fn extract_box(
        &self,
        doc: &mut Document,
        box_node: NodeId,
    ) -> Result<Vec<Fragment>, ExtractError> {
        let mut to_edit = Vec::new();
        let mut to_remove = Vec::new();

        for p in doc.element_children(box_node) {
            if !self.is_paragraph(doc, p) {
                continue;
            }
            // 上一轮可能把它隐藏了
            doc.remove_attribute(p, "style")?;

            if doc.query_class(p, &self.annotation_class).is_some() {
                to_remove.push(p);
                continue;
            }

            let copy = doc.clone_deep(p)?;
            to_edit.push(copy);
            doc.set_style_property(p, "display", "none")?;
        }

        for p in to_remove.iter().rev() {
            doc.remove(*p)?;
        }

        let mut fragments = Vec::with_capacity(to_edit.len());
        let mut offset = 0;
        for p in &to_edit {
            let (text_node, normalized) = doc
                .first_child(*p)
                .and_then(|node| doc.text(node).map(|data| (node, normalize(data))))
                .ok_or(ExtractError::MissingText { paragraph: *p })?;

            let length = normalized.encode_utf16().count();
            doc.set_text(text_node, normalized)?;

            let start = offset;
            offset += length;
            fragments.push(Fragment {
                node: text_node,
                start,
                end: offset,
                length,
                has_ruby: false,
            });
        }

        doc.append_children(box_node, &to_edit)?;

        debug!(
            "box {}: 提取 {} 个片段, 移除 {} 个已标注段落",
            box_node,
            fragments.len(),
            to_remove.len()
        );
        Ok(fragments)
    }

    /// 依次提取 `page` 下每个子元素（box）的片段序列，空 box 也会保留一个空序列
    pub fn extract_page(
        &self,
        doc: &mut Document,
        page: NodeId,
    ) -> Result<Vec<Vec<Fragment>>, ExtractError> {
        doc.element_children(page)
            .into_iter()
            .map(|box_node| self.extract_box(doc, box_node))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FragmentExtractor {
        FragmentExtractor::new("P", "jpdb-word")
    }

    fn build_box(doc: &mut Document, lines: &[&str]) -> (NodeId, Vec<NodeId>) {
        let box_node = doc.create_element("div");
        let body = doc.body();
        doc.append_child(body, box_node).unwrap();
        let paragraphs = lines
            .iter()
            .map(|line| {
                let p = doc.create_element("p");
                let text = doc.create_text(*line);
                doc.append_child(p, text).unwrap();
                doc.append_child(box_node, p).unwrap();
                p
            })
            .collect();
        (box_node, paragraphs)
    }

    fn mark_annotated(doc: &mut Document, p: NodeId) {
        let span = doc.create_element("span");
        doc.set_attribute(span, "class", "jpdb-word").unwrap();
        doc.append_child(p, span).unwrap();
    }

    #[test]
    fn test_fragments_partition_box_text() {
        let mut doc = Document::new();
        let (box_node, _) = build_box(&mut doc, &["こんにちは", "世界", "です"]);

        let fragments = extractor().extract_box(&mut doc, box_node).unwrap();

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].start, 0);
        for pair in fragments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for f in &fragments {
            assert_eq!(f.end - f.start, f.length);
            assert!(!f.has_ruby);
        }
        assert_eq!(fragments[2].end, 5 + 2 + 2);
    }

    #[test]
    fn test_lengths_use_normalized_text() {
        let mut doc = Document::new();
        let (box_node, _) = build_box(&mut doc, &["あ．．．", "い！？"]);

        let fragments = extractor().extract_box(&mut doc, box_node).unwrap();

        assert_eq!(doc.text(fragments[0].node), Some("あ…"));
        assert_eq!(doc.text(fragments[1].node), Some("い“⁉"));
        assert_eq!(fragments[0].length, 2);
        assert_eq!(fragments[1].start, 2);
        assert_eq!(fragments[1].end, 5);
    }

    #[test]
    fn test_originals_hidden_and_copies_appended() {
        let mut doc = Document::new();
        let (box_node, originals) = build_box(&mut doc, &["あ！！", "い"]);
        let original_text = doc.first_child(originals[0]).unwrap();

        let fragments = extractor().extract_box(&mut doc, box_node).unwrap();

        let children = doc.children(box_node).to_vec();
        assert_eq!(children.len(), 4);
        assert_eq!(&children[..2], originals.as_slice());
        for p in &originals {
            assert_eq!(doc.style_property(*p, "display").as_deref(), Some("none"));
        }
        for copy in &children[2..] {
            assert_eq!(doc.style_property(*copy, "display"), None);
        }
        // 原节点保留原始文本，只有拷贝携带规范化后的文本
        assert_eq!(doc.text(original_text), Some("あ！！"));
        assert_ne!(fragments[0].node, original_text);
        assert_eq!(doc.parent(fragments[0].node), Some(children[2]));
        assert_eq!(doc.text(fragments[0].node), Some("あ‼"));
    }

    #[test]
    fn test_annotated_paragraphs_are_removed() {
        let mut doc = Document::new();
        let (box_node, paragraphs) = build_box(&mut doc, &["あ", "い", "う"]);
        mark_annotated(&mut doc, paragraphs[1]);

        let fragments = extractor().extract_box(&mut doc, box_node).unwrap();

        assert_eq!(fragments.len(), 2);
        assert_eq!(doc.text(fragments[0].node), Some("あ"));
        assert_eq!(doc.text(fragments[1].node), Some("う"));
        assert_eq!(fragments[1].start, 1);
        assert!(!doc.children(box_node).contains(&paragraphs[1]));
        assert!(doc.children(box_node).contains(&paragraphs[0]));
        assert!(doc.children(box_node).contains(&paragraphs[2]));
    }

    #[test]
    fn test_second_pass_reextracts_live_paragraphs() {
        let mut doc = Document::new();
        let (box_node, originals) = build_box(&mut doc, &["あ"]);
        let first = extractor().extract_box(&mut doc, box_node).unwrap();

        // 模拟标注流程把拷贝里的文本换成了标注结果
        let copy = doc.parent(first[0].node).unwrap();
        doc.remove(first[0].node).unwrap();
        mark_annotated(&mut doc, copy);
        // 阅读器翻页时复用原节点并换掉文字
        let live_text = doc.first_child(originals[0]).unwrap();
        doc.set_text(live_text, "次のページ").unwrap();

        let second = extractor().extract_box(&mut doc, box_node).unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(doc.text(second[0].node), Some("次のページ"));
        assert!(!doc.children(box_node).contains(&copy));
        assert_eq!(doc.style_property(originals[0], "display").as_deref(), Some("none"));
    }

    #[test]
    fn test_non_paragraph_children_are_ignored() {
        let mut doc = Document::new();
        let (box_node, _) = build_box(&mut doc, &["あ"]);
        let div = doc.create_element("div");
        let text = doc.create_text("ignored");
        doc.append_child(div, text).unwrap();
        doc.append_child(box_node, div).unwrap();

        let fragments = extractor().extract_box(&mut doc, box_node).unwrap();

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].end, 1);
    }

    #[test]
    fn test_empty_box_yields_no_fragments() {
        let mut doc = Document::new();
        let (box_node, _) = build_box(&mut doc, &[]);
        assert!(extractor().extract_box(&mut doc, box_node).unwrap().is_empty());
    }

    #[test]
    fn test_paragraph_without_text_child_is_an_error() {
        let mut doc = Document::new();
        let (box_node, _) = build_box(&mut doc, &[]);
        let p = doc.create_element("p");
        let span = doc.create_element("span");
        doc.append_child(p, span).unwrap();
        doc.append_child(box_node, p).unwrap();

        let err = extractor().extract_box(&mut doc, box_node).unwrap_err();
        assert!(matches!(err, ExtractError::MissingText { .. }));
    }
}
