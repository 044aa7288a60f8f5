//! 错误提示
//!
//! 在阅读器页面右下角弹出一条会自动消失的提示

use anyhow::Result;

use crate::infrastructure::JsExecutor;

const TOAST_DURATION_MS: u64 = 8_000;

pub fn toast_script(message: &str) -> String {
    let message = serde_json::to_string(message).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(() => {{
    const toast = document.createElement('div');
    toast.className = 'mokuro-integration-toast';
    toast.textContent = {message};
    toast.style.cssText = 'position:fixed;right:1em;bottom:1em;z-index:2147483647;padding:.6em 1em;background:#b00020;color:#fff;border-radius:4px;';
    toast.addEventListener('click', () => toast.remove());
    document.body.appendChild(toast);
    setTimeout(() => toast.remove(), {duration});
}})()"#,
        duration = TOAST_DURATION_MS,
    )
}

/// 在页面上显示错误
pub async fn show_error_toast(executor: &JsExecutor, message: &str) -> Result<()> {
    executor.run(toast_script(message)).await
}
