//! 翻页处理流程 - 流程层
//!
//! 每条 DOM 变更记录走一遍：
//! 1. 解析当前页 ID（面板第一个子元素上的属性），拿不到就忽略
//! 2. 该页已有待处理批次 → 忽略（同一页触发了两次）
//! 3. 取消所有旧页面的批次（必须在本页批次登记之前完成）
//! 4. 逐个 box 提取片段，构建批次，登记，挂上完成后注销的回调
//! 5. 把批次交给传输层（即使为空也交）

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::batch::{Applied, BatchRegistry, ParagraphParser, ParseBatch, Settlement};
use crate::config::Config;
use crate::dom::{Document, MutationRecord, NodeId};
use crate::extract::{Fragment, FragmentExtractor};
use crate::transport::ParseTransport;
use crate::utils::truncate_text;

/// 阅读器页面结构
#[derive(Debug, Clone)]
pub struct PanelLayout {
    /// 漫画面板元素 id
    pub panel_id: String,
    /// 面板第一个子元素上标识当前页的属性
    pub page_id_attribute: String,
}

impl PanelLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            panel_id: config.panel_id.clone(),
            page_id_attribute: config.page_id_attribute.clone(),
        }
    }
}

/// 单条变更的处理结果
#[derive(Debug)]
pub enum HandleOutcome {
    /// 不是属性变更，或者页面上没有面板 / 页 ID
    NotApplicable,
    /// 该页已有待处理的批次
    AlreadyPending { page_id: String },
    /// 已交给传输层
    Dispatched {
        page_id: String,
        /// 交给传输层的批次
        batches: Vec<ParseBatch>,
        /// 完成后注销的回调任务，没有登记任何批次时为 `None`
        settled: Option<JoinHandle<()>>,
    },
}

/// 翻页处理流程
pub struct ChangeHandler<P, T> {
    registry: Arc<BatchRegistry>,
    extractor: FragmentExtractor,
    parser: P,
    transport: T,
    layout: PanelLayout,
}

impl<P: ParagraphParser, T: ParseTransport> ChangeHandler<P, T> {
    pub fn new(
        registry: Arc<BatchRegistry>,
        extractor: FragmentExtractor,
        parser: P,
        transport: T,
        layout: PanelLayout,
    ) -> Self {
        Self {
            registry,
            extractor,
            parser,
            transport,
            layout,
        }
    }

    /// 找到当前页元素和它的页 ID
    pub fn resolve_page(&self, doc: &Document) -> Option<(NodeId, String)> {
        let panel = doc.element_by_id(&self.layout.panel_id)?;
        let page = doc.first_element_child(panel)?;
        let page_id = doc.attribute(page, &self.layout.page_id_attribute)?;
        Some((page, page_id.to_string()))
    }

    /// 处理一条变更记录
    ///
    /// 需要在 tokio 运行时内调用（完成回调通过 `tokio::spawn` 挂出）。
    pub fn handle(&self, doc: &mut Document, record: &MutationRecord) -> Result<HandleOutcome> {
        if !record.is_attributes() {
            return Ok(HandleOutcome::NotApplicable);
        }
        let Some((page, page_id)) = self.resolve_page(doc) else {
            // 大概是在菜单之类的界面上
            debug!("未找到面板或页 ID，忽略变更");
            return Ok(HandleOutcome::NotApplicable);
        };

        if self.registry.contains(&page_id) {
            warn!("页面 {} 已有待处理的批次，忽略重复变更", page_id);
            return Ok(HandleOutcome::AlreadyPending { page_id });
        }

        // 先取消旧页面，否则旧页面的文本可能出现在新页面上
        self.registry.cancel_all();

        let boxes: Vec<Vec<Fragment>> = self
            .extractor
            .extract_page(doc, page)
            .with_context(|| format!("提取页面 {} 的文本失败", page_id))?
            .into_iter()
            .filter(|fragments| !fragments.is_empty())
            .collect();

        let mut batches = Vec::new();
        let mut settled = None;
        if boxes.is_empty() {
            debug!("页面 {} 没有可解析的文本", page_id);
        } else {
            let fragment_count: usize = boxes.iter().map(Vec::len).sum();
            let (page_batches, applied) = self.parser.parse_paragraphs(doc, boxes);
            if let Some(first) = page_batches.first().and_then(|b| b.paragraphs().first()) {
                debug!("页面 {} 首段: {}", page_id, truncate_text(&first.text, 40));
            }

            // 只有另一个线程在 contains 之后抢先登记了同一页才会失败；
            // 此时旧页面已被取消、快照已被改动，本条记录整体作废，交给 handle_all 记日志
            self.registry
                .register(page_id.clone(), page_batches.clone())
                .with_context(|| format!("登记页面 {} 的批次失败", page_id))?;
            let batch_ids = page_batches.iter().map(ParseBatch::id).collect();
            settled = Some(self.watch_settlement(page_id.clone(), batch_ids, applied));

            info!(
                "📖 页面 {}: {} 个片段, {} 个批次",
                page_id,
                fragment_count,
                page_batches.len()
            );
            batches = page_batches;
        }

        self.transport.request_parse(batches.clone());

        Ok(HandleOutcome::Dispatched {
            page_id,
            batches,
            settled,
        })
    }

    /// 按顺序处理一组变更记录，单条出错只记录日志
    pub fn handle_all(&self, doc: &mut Document, records: &[MutationRecord]) -> Vec<HandleOutcome> {
        records
            .iter()
            .filter_map(|record| match self.handle(doc, record) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!("处理页面变更失败: {:#}", e);
                    None
                }
            })
            .collect()
    }

    /// 所有批次都结束后注销页面
    ///
    /// 只记批次 id 不持有批次本身，否则批次永远不会因为被丢弃而结束。
    fn watch_settlement(
        &self,
        page_id: String,
        batch_ids: Vec<u64>,
        applied: Vec<Applied>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let settlements = join_all(applied).await;
            let abandoned = settlements
                .iter()
                .filter(|s| **s == Settlement::Abandoned)
                .count();
            if registry.deregister(&page_id, &batch_ids) {
                debug!(
                    "页面 {} 的批次全部结束 ({} 个未完成)，已注销",
                    page_id, abandoned
                );
            }
        })
    }
}
