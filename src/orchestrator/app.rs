//! 应用入口 - 编排层
//!
//! 持有浏览器和 JsExecutor，组装各层能力，并提供顶层保护：
//! 启动或观察过程中的任何错误都会被记录并以提示的形式显示在页面上，之后不再重试。

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Browser;
use tracing::{error, info, warn};

use crate::batch::{BatchRegistry, ParagraphBatcher};
use crate::browser::{self, show_error_toast, PropertyChangeObserver};
use crate::config::Config;
use crate::extract::FragmentExtractor;
use crate::infrastructure::JsExecutor;
use crate::transport::HttpTransport;
use crate::utils::logging::log_startup;
use crate::workflow::{ChangeHandler, PanelLayout};

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    executor: JsExecutor,
}

impl App {
    /// 连接浏览器并找到阅读器页面
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let (browser, page) = browser::connect_to_browser_and_page(
            config.browser_debug_port,
            &config.target_url,
            &config.target_title,
        )
        .await?;

        Ok(Self {
            config,
            _browser: browser,
            executor: JsExecutor::new(page),
        })
    }

    /// 运行，出错时只记录并提示，不向外传播
    pub async fn run(&self) -> Result<()> {
        if let Err(e) = self.watch().await {
            error!("❌ 阅读器集成已停止: {:#}", e);
            let message = format!("Mokuro 集成出错: {}", e);
            if let Err(toast_err) = show_error_toast(&self.executor, &message).await {
                warn!("无法在页面上显示错误: {:#}", toast_err);
            }
        }
        Ok(())
    }

    async fn watch(&self) -> Result<()> {
        let registry = Arc::new(BatchRegistry::new());
        let handler = ChangeHandler::new(
            Arc::clone(&registry),
            FragmentExtractor::from_config(&self.config),
            ParagraphBatcher::new(self.config.max_batch_chars),
            HttpTransport::from_config(&self.config)?,
            PanelLayout::from_config(&self.config),
        );

        let mut observer = PropertyChangeObserver::new(self.executor.clone(), &self.config);
        observer.ensure_container().await?;
        info!("👀 开始观察页面变化");

        tokio::select! {
            result = observer.observe(&handler) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("收到退出信号，取消 {} 个页面的待处理批次", registry.len());
                registry.cancel_all();
                Ok(())
            }
        }
    }
}
