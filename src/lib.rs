//! # Mokuro Integration
//!
//! 观察 Mokuro 漫画阅读器的翻页，把页面上的日文文本提取成带位置的片段，
//! 交给外部的解析/查词流水线；用户翻走之后，旧页面的文本不会再被送达。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - `JsExecutor`，唯一的 page owner，提供 eval() 能力
//! - `dom/` - 内存文档模型、页面快照、变更记录
//!
//! ### ② 能力层
//! - `text/` - 标点规范化
//! - `extract/` - 从 box 中提取片段（克隆 + 隐藏原段落）
//! - `batch/` - 解析批次、批次构建、页面批次注册表
//! - `transport/` - 把批次交给解析流水线
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - `ChangeHandler`，处理一条变更记录的完整流程
//!
//! ### ④ 编排层（Orchestration）
//! - `browser/` - 连接浏览器、轮询观察、错误提示
//! - `orchestrator/` - `App`，组装各层并提供顶层保护
//!
//! ## 模块结构

pub mod batch;
pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod extract;
pub mod infrastructure;
pub mod orchestrator;
pub mod text;
pub mod transport;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use batch::{BatchRegistry, ParagraphBatcher, ParagraphParser, ParseBatch};
pub use config::Config;
pub use dom::{Document, MutationRecord, NodeId};
pub use error::{AppError, AppResult};
pub use extract::{Fragment, FragmentExtractor};
pub use infrastructure::JsExecutor;
pub use orchestrator::App;
pub use transport::ParseTransport;
pub use utils::logging as logger;
pub use workflow::{ChangeHandler, HandleOutcome, PanelLayout};
