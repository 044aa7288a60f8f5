//! 批次构建
//!
//! `ParagraphParser` 是交给解析流水线之前的最后一步：
//! 把每个 box 的片段序列变成可中止的批次和对应的完成信号。

use tracing::debug;

use crate::batch::parse_batch::{Applied, Paragraph, ParseBatch};
use crate::dom::Document;
use crate::extract::Fragment;

/// 批次构建能力
pub trait ParagraphParser: Send + Sync {
    /// # 参数
    /// - `doc`: 片段所引用的文档，用来读取文本
    /// - `paragraphs`: 每个 box 一个片段序列，按页面顺序
    ///
    /// # 返回
    /// (批次列表, 完成信号列表)，两者一一对应
    fn parse_paragraphs(
        &self,
        doc: &Document,
        paragraphs: Vec<Vec<Fragment>>,
    ) -> (Vec<ParseBatch>, Vec<Applied>);
}

/// 按字数把 box 分组成批次
///
/// 单个 box 不会被拆开；一个 box 超过上限时单独成批。
#[derive(Debug, Clone)]
pub struct ParagraphBatcher {
    max_chars_per_batch: usize,
}

impl ParagraphBatcher {
    pub fn new(max_chars_per_batch: usize) -> Self {
        Self {
            max_chars_per_batch,
        }
    }

    fn paragraph(doc: &Document, fragments: Vec<Fragment>) -> Paragraph {
        let text = fragments
            .iter()
            .filter_map(|f| doc.text(f.node))
            .collect::<String>();
        Paragraph { fragments, text }
    }
}

impl ParagraphParser for ParagraphBatcher {
    fn parse_paragraphs(
        &self,
        doc: &Document,
        paragraphs: Vec<Vec<Fragment>>,
    ) -> (Vec<ParseBatch>, Vec<Applied>) {
        let mut groups: Vec<Vec<Paragraph>> = Vec::new();
        let mut current = Vec::new();
        let mut current_len = 0;

        for fragments in paragraphs.into_iter().filter(|f| !f.is_empty()) {
            let paragraph = Self::paragraph(doc, fragments);
            let len = paragraph.len();
            if !current.is_empty() && current_len + len > self.max_chars_per_batch {
                groups.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current_len += len;
            current.push(paragraph);
        }
        if !current.is_empty() {
            groups.push(current);
        }

        debug!("构建 {} 个批次", groups.len());
        groups.into_iter().map(ParseBatch::new).unzip()
    }
}
