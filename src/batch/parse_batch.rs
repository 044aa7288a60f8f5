//! 解析批次
//!
//! 一个批次 = 若干段落 + 中止句柄 + 完成信号。
//! 批次可以被克隆（注册表和传输层各持有一份），所有克隆共享同一份状态。

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::extract::Fragment;

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

/// 中止句柄
///
/// 中止只是尽力而为：置位之后由持有批次的一方自行检查 `is_aborted()`。
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 中止，可以重复调用
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// 一个 box 的文本：片段序列和拼接后的文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub fragments: Vec<Fragment>,
    pub text: String,
}

impl Paragraph {
    /// 文本长度（UTF-16 码元）
    pub fn len(&self) -> usize {
        self.fragments.last().map(|f| f.end).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 完成信号的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// 解析结果已经应用到页面
    Applied,
    /// 批次的所有持有者都已释放，但从未完成（通常是被中止）
    Abandoned,
}

/// 完成信号
///
/// 对应批次 `complete()` 时得到 `Settlement::Applied`。
#[derive(Debug)]
pub struct Applied(oneshot::Receiver<()>);

impl Future for Applied {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|result| match result {
            Ok(()) => Settlement::Applied,
            Err(_) => Settlement::Abandoned,
        })
    }
}

#[derive(Debug)]
struct BatchInner {
    id: u64,
    paragraphs: Vec<Paragraph>,
    abort: AbortHandle,
    done: Mutex<Option<oneshot::Sender<()>>>,
}

/// 解析批次
#[derive(Debug, Clone)]
pub struct ParseBatch {
    inner: Arc<BatchInner>,
}

impl ParseBatch {
    /// 创建批次，同时返回它的完成信号
    pub fn new(paragraphs: Vec<Paragraph>) -> (Self, Applied) {
        let (tx, rx) = oneshot::channel();
        let batch = Self {
            inner: Arc::new(BatchInner {
                id: NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed),
                paragraphs,
                abort: AbortHandle::new(),
                done: Mutex::new(Some(tx)),
            }),
        };
        (batch, Applied(rx))
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.inner.paragraphs
    }

    pub fn abort_handle(&self) -> &AbortHandle {
        &self.inner.abort
    }

    pub fn abort(&self) {
        self.inner.abort.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.abort.is_aborted()
    }

    /// 标记解析结果已应用，只有第一次调用生效
    ///
    /// # 返回
    /// 本次调用是否真正发出了完成信号
    pub fn complete(&self) -> bool {
        let sender = match self.inner.done.lock() {
            Ok(mut done) => done.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// 两个句柄是否指向同一个批次
    pub fn same_batch(&self, other: &ParseBatch) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
