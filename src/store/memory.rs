//! # 进程内存储
//!
//! 不依赖数据库的密钥库和用量账本，用于嵌入、演示和测试

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::key_store::{KeyStore, ResolvedKey};
use super::usage_ledger::{TokenUsage, UsageBucket, UsageLedger};
use crate::error::Result;

/// 进程内密钥库，记录查询次数
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: DashMap<String, ResolvedKey>,
    lookups: AtomicUsize,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个已启用的代理密钥
    pub fn insert(&self, proxy_key: impl Into<String>, resolved: ResolvedKey) {
        self.keys.insert(proxy_key.into(), resolved);
    }

    /// 停用（移除）一个代理密钥
    pub fn deactivate(&self, proxy_key: &str) -> bool {
        self.keys.remove(proxy_key).is_some()
    }

    /// `find_active` 被调用的次数
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn find_active(&self, proxy_key: &str) -> Result<Option<ResolvedKey>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.get(proxy_key).map(|entry| entry.value().clone()))
    }
}

/// 进程内用量账本
#[derive(Debug, Default)]
pub struct MemoryUsageLedger {
    buckets: DashMap<(i32, UsageBucket), TokenUsage>,
    writes: AtomicUsize,
}

impl MemoryUsageLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `increment` 被调用的次数
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 某个密钥所有桶的合计
    pub fn total_for_key(&self, api_key_id: i32) -> TokenUsage {
        self.buckets
            .iter()
            .filter(|entry| entry.key().0 == api_key_id)
            .fold(TokenUsage::default(), |acc, entry| acc.saturating_add(*entry.value()))
    }
}

#[async_trait]
impl UsageLedger for MemoryUsageLedger {
    async fn increment(
        &self,
        api_key_id: i32,
        bucket: UsageBucket,
        delta: TokenUsage,
    ) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        // entry 持有分片写锁，读改写在锁内完成
        self.buckets
            .entry((api_key_id, bucket))
            .and_modify(|usage| *usage = usage.saturating_add(delta))
            .or_insert(delta);
        Ok(())
    }

    async fn get(&self, api_key_id: i32, bucket: UsageBucket) -> Result<TokenUsage> {
        Ok(self
            .buckets
            .get(&(api_key_id, bucket))
            .map(|entry| *entry.value())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn resolved(id: i32) -> ResolvedKey {
        ResolvedKey {
            api_key_id: id,
            upstream_api_key: format!("sk-{id}"),
            base_url: "https://api.openai.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_key_store_counts_lookups() {
        let store = MemoryKeyStore::new();
        store.insert("pk-1", resolved(1));

        assert_eq!(store.find_active("pk-1").await.unwrap(), Some(resolved(1)));
        assert_eq!(store.find_active("pk-2").await.unwrap(), None);
        assert_eq!(store.lookups(), 2);

        assert!(store.deactivate("pk-1"));
        assert_eq!(store.find_active("pk-1").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let ledger = Arc::new(MemoryUsageLedger::new());
        let bucket = UsageBucket::new(2024, 6).unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    ledger.increment(1, bucket, TokenUsage::new(3, 2)).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(ledger.get(1, bucket).await.unwrap(), TokenUsage::new(150, 100));
        assert_eq!(ledger.writes(), 50);
        assert_eq!(ledger.total_for_key(1), TokenUsage::new(150, 100));
    }
}
