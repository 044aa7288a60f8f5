//! 进程内传输：批次直接发到一个 channel，由同进程的解析任务消费

use tokio::sync::mpsc;
use tracing::warn;

use crate::batch::ParseBatch;
use crate::transport::ParseTransport;

/// 进程内传输
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<ParseBatch>,
}

impl ChannelTransport {
    /// 创建传输及其接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ParseBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ParseTransport for ChannelTransport {
    fn request_parse(&self, batches: Vec<ParseBatch>) {
        for batch in batches {
            let id = batch.id();
            if self.tx.send(batch).is_err() {
                warn!("解析任务已关闭，丢弃批次 {}", id);
            }
        }
    }
}
