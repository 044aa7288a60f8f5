use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AppResult, ConfigError};

/// 程序配置
///
/// 加载顺序：默认值 → `MOKURO_CONFIG` 指向的 TOML 文件 → 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 阅读器 URL（找不到已打开的阅读器页面时导航到这里）
    pub target_url: String,
    /// 阅读器页面标题包含的关键字
    pub target_title: String,
    // --- 页面结构 ---
    /// 被观察的容器元素 id，启动时必须存在
    pub container_id: String,
    /// 漫画面板元素 id
    pub panel_id: String,
    /// 面板第一个子元素上标识当前页的属性
    pub page_id_attribute: String,
    /// 段落元素标签
    pub paragraph_tag: String,
    /// 标注结果使用的 class
    pub annotation_class: String,
    // --- 运行参数 ---
    /// 轮询页面的间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单个批次的最大字数
    pub max_batch_chars: usize,
    /// 解析服务地址
    pub parse_endpoint: String,
    /// 解析请求超时（毫秒）
    pub parse_timeout_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: "https://reader.mokuro.app".to_string(),
            target_title: "mokuro".to_string(),
            container_id: "popupAbout".to_string(),
            panel_id: "manga-panel".to_string(),
            page_id_attribute: "background-image".to_string(),
            paragraph_tag: "P".to_string(),
            annotation_class: "jpdb-word".to_string(),
            poll_interval_ms: 250,
            max_batch_chars: 2000,
            parse_endpoint: "http://127.0.0.1:8765/parse".to_string(),
            parse_timeout_ms: 30_000,
            verbose_logging: false,
            output_log_file: "mokuro_integration.log".to_string(),
        }
    }
}

impl Config {
    /// 读取配置文件（如有）并应用环境变量
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("MOKURO_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env())
    }

    /// 只从环境变量加载，未设置或无法解析的项使用默认值
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// 从 TOML 文件加载，文件中没有的项使用默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::TomlParseFailed { source, .. } => ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParseFailed {
            path: String::new(),
            source: Box::new(e),
        })
    }

    fn with_env(self) -> Self {
        Self {
            browser_debug_port: env_or("BROWSER_DEBUG_PORT", self.browser_debug_port),
            target_url: std::env::var("TARGET_URL").unwrap_or(self.target_url),
            target_title: std::env::var("TARGET_TITLE").unwrap_or(self.target_title),
            container_id: std::env::var("CONTAINER_ID").unwrap_or(self.container_id),
            panel_id: std::env::var("PANEL_ID").unwrap_or(self.panel_id),
            page_id_attribute: std::env::var("PAGE_ID_ATTRIBUTE").unwrap_or(self.page_id_attribute),
            paragraph_tag: std::env::var("PARAGRAPH_TAG").unwrap_or(self.paragraph_tag),
            annotation_class: std::env::var("ANNOTATION_CLASS").unwrap_or(self.annotation_class),
            poll_interval_ms: env_or("POLL_INTERVAL_MS", self.poll_interval_ms),
            max_batch_chars: env_or("MAX_BATCH_CHARS", self.max_batch_chars),
            parse_endpoint: std::env::var("PARSE_ENDPOINT").unwrap_or(self.parse_endpoint),
            parse_timeout_ms: env_or("PARSE_TIMEOUT_MS", self.parse_timeout_ms),
            verbose_logging: env_or("VERBOSE_LOGGING", self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        }
    }
}

/// 读取并解析环境变量，无法解析时保留原值
fn env_or<T: std::str::FromStr>(var_name: &str, current: T) -> T {
    match parse_env(var_name) {
        Ok(Some(value)) => value,
        Ok(None) => current,
        Err(e) => {
            warn!("{}，使用原值", e);
            current
        }
    }
}

fn parse_env<T: std::str::FromStr>(var_name: &str) -> Result<Option<T>, ConfigError> {
    let Ok(value) = std::env::var(var_name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value,
            expected_type: std::any::type_name::<T>().to_string(),
        })
}
