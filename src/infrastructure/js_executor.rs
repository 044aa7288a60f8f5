//! JS 执行器 - 基础设施层
//!
//! 唯一持有阅读器 page 的地方，对外只暴露"在页面里执行脚本"的能力

use anyhow::{Context, Result};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::error::AppError;

/// JS 执行器
///
/// 不认识面板、box、批次，只负责执行脚本和搬运 JSON。
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 执行脚本并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let js_code = js_code.into();
        trace!("执行脚本: {} 字节", js_code.len());
        let result = self
            .page
            .evaluate(js_code)
            .await
            .map_err(AppError::from)?;
        // 脚本没有返回值时 into_value 会失败，视为 null
        Ok(result.into_value().unwrap_or(JsonValue::Null))
    }

    /// 执行脚本并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).context("页面脚本返回值格式不符")
    }

    /// 执行只关心副作用的脚本
    pub async fn run(&self, js_code: impl Into<String>) -> Result<()> {
        self.eval(js_code).await.map(|_| ())
    }
}
