//! 解析请求的传输层
//!
//! 核心逻辑只负责"把批次交出去"，不关心对方怎么解析、什么时候返回。

pub mod channel;
pub mod http;

pub use channel::ChannelTransport;
pub use http::HttpTransport;

use crate::batch::ParseBatch;

/// 解析请求传输能力
///
/// `request_parse` 是发出即忘的：不返回结果，批次完成时由接收方调用 `ParseBatch::complete`。
pub trait ParseTransport: Send + Sync {
    fn request_parse(&self, batches: Vec<ParseBatch>);
}
