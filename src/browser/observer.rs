//! 属性变更观察 - 适配层
//!
//! 通过 DevTools 协议拿不到页面里 MutationObserver 的回调，这里改为轮询：
//! 每个周期读一次当前页 ID，变化时把面板子树快照成 `Document`，
//! 生成一条属性变更记录交给 `ChangeHandler`，再把快照上的修改换算成针对原节点的补丁，
//! 回放到页面上。

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::batch::ParagraphParser;
use crate::config::Config;
use crate::browser::patch::{BoxPatch, PageBaseline};
use crate::dom::{Document, MutationRecord, NodeSnapshot};
use crate::error::AppError;
use crate::infrastructure::JsExecutor;
use crate::transport::ParseTransport;
use crate::workflow::{ChangeHandler, HandleOutcome};

/// 每个周期读取的页面状态
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub container_present: bool,
    pub page_id: Option<String>,
}

/// 页 ID 变化检测
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_page_id: Option<String>,
}

impl ChangeDetector {
    /// 页 ID 与上次不同（且存在）时返回 `true`
    pub fn observe(&mut self, state: &PageState) -> bool {
        match &state.page_id {
            Some(id) if self.last_page_id.as_deref() != Some(id.as_str()) => {
                self.last_page_id = Some(id.clone());
                true
            }
            Some(_) => false,
            None => {
                self.last_page_id = None;
                false
            }
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// 读取容器是否存在和当前页 ID
pub fn page_state_script(container_id: &str, panel_id: &str, attribute: &str) -> String {
    format!(
        r#"(() => {{
    const panel = document.getElementById({panel});
    const page = panel ? panel.firstElementChild : null;
    return {{
        containerPresent: document.getElementById({container}) !== null,
        pageId: page ? page.getAttribute({attribute}) : null,
    }};
}})()"#,
        container = js_string(container_id),
        panel = js_string(panel_id),
        attribute = js_string(attribute),
    )
}

/// 把面板子树序列化为 `NodeSnapshot` 的 JSON
pub fn panel_snapshot_script(panel_id: &str) -> String {
    format!(
        r#"(() => {{
    const serialize = (node) => node.nodeType === Node.TEXT_NODE
        ? {{ text: node.data }}
        : {{
            tag: node.tagName.toLowerCase(),
            attrs: Object.fromEntries([...node.attributes].map(a => [a.name, a.value])),
            children: [...node.childNodes]
                .filter(n => n.nodeType === Node.ELEMENT_NODE || n.nodeType === Node.TEXT_NODE)
                .map(serialize),
        }};
    const panel = document.getElementById({panel});
    return panel ? serialize(panel) : null;
}})()"#,
        panel = js_string(panel_id),
    )
}

/// 在当前页上执行补丁操作，页 ID 已经变化时不做任何修改
pub fn write_back_script(
    panel_id: &str,
    attribute: &str,
    page_id: &str,
    patches: &[BoxPatch],
) -> String {
    let patches = serde_json::to_string(patches).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
    const panel = document.getElementById({panel});
    const page = panel ? panel.firstElementChild : null;
    if (!page || page.getAttribute({attribute}) !== {page_id}) return false;
    const boxes = [...page.children];
    const applyStyle = (node, style) => style === null
        ? node.removeAttribute('style')
        : node.setAttribute('style', style);
    for (const patch of {patches}) {{
        const box = boxes[patch.boxIndex];
        if (!box) continue;
        const originals = [...box.children];
        for (const op of patch.ops) {{
            const node = originals[op.op === 'appendClone' ? op.source : op.index];
            if (!node) continue;
            if (op.op === 'setStyle') {{
                applyStyle(node, op.style);
            }} else if (op.op === 'remove') {{
                node.remove();
            }} else if (op.op === 'appendClone') {{
                const copy = node.cloneNode(true);
                applyStyle(copy, op.style);
                if (copy.firstChild) copy.firstChild.data = op.text;
                box.append(copy);
            }}
        }}
    }}
    return true;
}})()"#,
        panel = js_string(panel_id),
        attribute = js_string(attribute),
        page_id = js_string(page_id),
    )
}

/// 属性变更观察器
pub struct PropertyChangeObserver {
    executor: JsExecutor,
    container_id: String,
    panel_id: String,
    page_id_attribute: String,
    poll_interval: Duration,
    detector: ChangeDetector,
}

impl PropertyChangeObserver {
    pub fn new(executor: JsExecutor, config: &Config) -> Self {
        Self {
            executor,
            container_id: config.container_id.clone(),
            panel_id: config.panel_id.clone(),
            page_id_attribute: config.page_id_attribute.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(10)),
            detector: ChangeDetector::default(),
        }
    }

    async fn read_state(&self) -> Result<PageState> {
        self.executor
            .eval_as(page_state_script(
                &self.container_id,
                &self.panel_id,
                &self.page_id_attribute,
            ))
            .await
    }

    /// 启动前确认被观察的容器存在
    pub async fn ensure_container(&self) -> Result<()> {
        let state = self.read_state().await?;
        if !state.container_present {
            return Err(AppError::container_not_found(&self.container_id).into());
        }
        debug!("已找到容器 #{}", self.container_id);
        Ok(())
    }

    /// 持续观察，直到外部取消这个 future
    pub async fn observe<P, T>(&mut self, handler: &ChangeHandler<P, T>) -> Result<()>
    where
        P: ParagraphParser,
        T: ParseTransport,
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let state = match self.read_state().await {
                Ok(state) => state,
                Err(e) => {
                    warn!("读取页面状态失败: {:#}", e);
                    continue;
                }
            };
            if !self.detector.observe(&state) {
                continue;
            }
            if let Err(e) = self.dispatch(handler).await {
                warn!("处理翻页失败: {:#}", e);
            }
        }
    }

    async fn dispatch<P, T>(&self, handler: &ChangeHandler<P, T>) -> Result<()>
    where
        P: ParagraphParser,
        T: ParseTransport,
    {
        let snapshot: Option<NodeSnapshot> = self
            .executor
            .eval_as(panel_snapshot_script(&self.panel_id))
            .await?;
        let Some(snapshot) = snapshot else {
            return Ok(());
        };
        let mut doc = Document::from_snapshot(&snapshot).context("无法还原面板快照")?;
        let Some((page, page_id)) = handler.resolve_page(&doc) else {
            return Ok(());
        };
        let baseline = PageBaseline::capture(&doc, page);

        let record = MutationRecord::attributes(page, &self.page_id_attribute);
        let outcomes = handler.handle_all(&mut doc, &[record]);
        if outcomes
            .iter()
            .any(|o| matches!(o, HandleOutcome::Dispatched { .. }))
        {
            self.write_back(&page_id, &baseline.diff(&doc)).await?;
        }
        Ok(())
    }

    async fn write_back(&self, page_id: &str, patches: &[BoxPatch]) -> Result<()> {
        if patches.is_empty() {
            return Ok(());
        }
        let applied: bool = self
            .executor
            .eval_as(write_back_script(
                &self.panel_id,
                &self.page_id_attribute,
                page_id,
                patches,
            ))
            .await
            .context("写回页面失败")?;
        if !applied {
            // 处理期间又翻页了，下一轮轮询会处理新页面
            warn!("页面 {} 已不在面板上，放弃写回", page_id);
        }
        Ok(())
    }
}
