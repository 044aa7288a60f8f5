//! HTTP 传输：把批次 POST 给外部解析服务
//!
//! 中止检查放在传输层：发送前检查一次，拿到响应、准备应用结果前再检查一次，
//! 被中止的批次不会被标记为完成。

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::batch::ParseBatch;
use crate::config::Config;
use crate::transport::ParseTransport;

/// 请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseRequest<'a> {
    batch_id: u64,
    paragraphs: Vec<ParagraphPayload<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphPayload<'a> {
    text: &'a str,
    fragments: Vec<FragmentPayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FragmentPayload {
    start: usize,
    end: usize,
    length: usize,
    has_ruby: bool,
}

impl<'a> ParseRequest<'a> {
    fn from_batch(batch: &'a ParseBatch) -> Self {
        Self {
            batch_id: batch.id(),
            paragraphs: batch
                .paragraphs()
                .iter()
                .map(|p| ParagraphPayload {
                    text: &p.text,
                    fragments: p
                        .fragments
                        .iter()
                        .map(|f| FragmentPayload {
                            start: f.start,
                            end: f.end,
                            length: f.length,
                            has_ruby: f.has_ruby,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// HTTP 传输
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.parse_timeout_ms))
            .build()
            .context("无法创建 HTTP 客户端")?;
        Ok(Self::new(client, &config.parse_endpoint))
    }
}

impl ParseTransport for HttpTransport {
    fn request_parse(&self, batches: Vec<ParseBatch>) {
        if batches.is_empty() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("没有可用的 tokio 运行时，丢弃 {} 个批次", batches.len());
            return;
        };

        for batch in batches {
            if batch.is_aborted() {
                debug!("批次 {} 已被中止，不再发送", batch.id());
                continue;
            }
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            runtime.spawn(async move {
                let id = batch.id();
                if let Err(e) = send_batch(&client, &endpoint, &batch).await {
                    warn!("批次 {} 解析失败: {:#}", id, e);
                }
            });
        }
    }
}

async fn send_batch(client: &reqwest::Client, endpoint: &str, batch: &ParseBatch) -> Result<()> {
    let request = ParseRequest::from_batch(batch);
    let response = client
        .post(endpoint)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("请求解析服务失败: {}", endpoint))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("解析服务返回错误状态: {}", status);
    }
    let body: JsonValue = response.json().await.context("解析服务响应不是合法 JSON")?;

    if batch.is_aborted() {
        debug!("批次 {} 在解析期间被中止，丢弃结果", batch.id());
        return Ok(());
    }

    debug!(
        "批次 {} 解析完成, 返回 {} 个词",
        batch.id(),
        body.get("tokens")
            .and_then(JsonValue::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    );
    batch.complete();
    Ok(())
}
