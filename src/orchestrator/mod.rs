//! 编排层（Orchestration Layer）
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (持有 Browser / JsExecutor)
//!     ↓
//! browser::PropertyChangeObserver (轮询页面，产生变更记录)
//!     ↓
//! workflow::ChangeHandler (处理单条变更)
//!     ↓
//! extract / batch / transport (能力层)
//!     ↓
//! dom / infrastructure (基础设施)
//! ```

pub mod app;

pub use app::App;
