//! 页面批次注册表
//!
//! 进程内唯一的共享可变状态：页面 ID → 该页面尚未完成的批次。
//! 由 `ChangeHandler` 的同步段和批次完成后的回调访问。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::batch::parse_batch::ParseBatch;

/// 注册失败
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// 页面已有待处理的批次，覆盖会让旧批次失去中止途径
    #[error("页面 {0} 已有待处理的批次")]
    AlreadyPending(String),
}

/// 页面批次注册表
#[derive(Debug, Default)]
pub struct BatchRegistry {
    pending: Mutex<HashMap<String, Vec<ParseBatch>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<ParseBatch>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 登记页面的批次，页面已存在时拒绝（不覆盖）
    pub fn register(
        &self,
        page_id: impl Into<String>,
        batches: Vec<ParseBatch>,
    ) -> Result<(), RegisterError> {
        let page_id = page_id.into();
        let mut pending = self.lock();
        if pending.contains_key(&page_id) {
            return Err(RegisterError::AlreadyPending(page_id));
        }
        debug!("登记页面 {} 的 {} 个批次", page_id, batches.len());
        pending.insert(page_id, batches);
        Ok(())
    }

    pub fn contains(&self, page_id: &str) -> bool {
        self.lock().contains_key(page_id)
    }

    /// 中止所有页面的所有批次并清空注册表
    ///
    /// # 返回
    /// 被中止的批次数量
    pub fn cancel_all(&self) -> usize {
        let mut pending = self.lock();
        let mut aborted = 0;
        for (page_id, batches) in pending.drain() {
            for batch in &batches {
                batch.abort();
                aborted += 1;
            }
            debug!("已中止页面 {} 的 {} 个批次", page_id, batches.len());
        }
        if aborted > 0 {
            info!("🛑 已取消 {} 个过期批次", aborted);
        }
        aborted
    }

    /// 移除页面条目，只由批次完成回调调用
    ///
    /// 页 ID 会重复出现（翻回同一页），所以只有条目里正是 `batch_ids` 这组批次时才移除，
    /// 旧回调不会误删后来重新登记的条目。
    ///
    /// # 返回
    /// 是否移除了条目
    pub fn deregister(&self, page_id: &str, batch_ids: &[u64]) -> bool {
        let mut pending = self.lock();
        let owned = pending.get(page_id).is_some_and(|batches| {
            batches.len() == batch_ids.len()
                && batches.iter().zip(batch_ids).all(|(b, id)| b.id() == *id)
        });
        if owned {
            pending.remove(page_id);
        }
        owned
    }

    /// 某个页面当前登记的批次
    pub fn batches(&self, page_id: &str) -> Vec<ParseBatch> {
        self.lock().get(page_id).cloned().unwrap_or_default()
    }

    pub fn pending_pages(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batches(n: usize) -> Vec<ParseBatch> {
        (0..n).map(|_| ParseBatch::new(Vec::new()).0).collect()
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = BatchRegistry::new();
        let first = batches(1);
        registry.register("page-a", first.clone()).unwrap();

        let err = registry.register("page-a", batches(2)).unwrap_err();

        assert_eq!(err, RegisterError::AlreadyPending("page-a".to_string()));
        let kept = registry.batches("page-a");
        assert_eq!(kept.len(), 1);
        assert!(kept[0].same_batch(&first[0]));
    }

    #[test]
    fn test_cancel_all_aborts_and_clears() {
        let registry = BatchRegistry::new();
        let a = batches(2);
        let b = batches(1);
        registry.register("page-a", a.clone()).unwrap();
        registry.register("page-b", b.clone()).unwrap();

        assert_eq!(registry.cancel_all(), 3);

        assert!(registry.is_empty());
        assert!(a.iter().chain(b.iter()).all(ParseBatch::is_aborted));
    }

    #[test]
    fn test_cancel_all_on_empty_registry() {
        let registry = BatchRegistry::new();
        assert_eq!(registry.cancel_all(), 0);
    }

    fn ids(batches: &[ParseBatch]) -> Vec<u64> {
        batches.iter().map(ParseBatch::id).collect()
    }

    #[test]
    fn test_deregister() {
        let registry = BatchRegistry::new();
        let first = batches(1);
        registry.register("page-a", first.clone()).unwrap();

        assert!(registry.deregister("page-a", &ids(&first)));
        assert!(!registry.deregister("page-a", &ids(&first)));
        assert!(!registry.contains("page-a"));
        // 条目移除后可以重新登记
        registry.register("page-a", batches(1)).unwrap();
        assert_eq!(registry.pending_pages(), vec!["page-a".to_string()]);
    }

    #[test]
    fn test_stale_deregister_keeps_new_entry() {
        let registry = BatchRegistry::new();
        let first = batches(2);
        registry.register("page-a", first.clone()).unwrap();
        registry.cancel_all();

        let second = batches(2);
        registry.register("page-a", second.clone()).unwrap();

        assert!(!registry.deregister("page-a", &ids(&first)));
        assert!(registry.contains("page-a"));
        assert_eq!(registry.cancel_all(), 2);
        assert!(second.iter().all(ParseBatch::is_aborted));
    }
}
