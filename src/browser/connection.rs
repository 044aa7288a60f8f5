use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::error::AppError;

/// 连接到已开启调试端口的浏览器，找到阅读器页面
///
/// 优先复用标题包含 `target_title` 的已打开页面，找不到时新建页面并导航到 `target_url`。
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: &str,
    target_title: &str,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url)
        .await
        .map_err(|e| AppError::browser_connection_failed(port, e))?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    let pages = browser.pages().await.map_err(AppError::from)?;
    debug!("获取到 {} 个页面", pages.len());

    for page in pages.iter() {
        match page.get_title().await {
            Ok(Some(title)) if title.to_lowercase().contains(&target_title.to_lowercase()) => {
                info!("✓ 找到阅读器页面: {}", title);
                return Ok((browser, page.clone()));
            }
            Ok(_) => {}
            Err(e) => warn!("读取页面标题失败: {}", e),
        }
    }

    debug!("未找到标题包含 '{}' 的页面，新建页面", target_title);
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(AppError::from)?;
    page.goto(target_url)
        .await
        .map_err(|e| AppError::navigation_failed(target_url, e))?;
    info!("已导航到: {}", target_url);

    Ok((browser, page))
}
