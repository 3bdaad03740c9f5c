//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于内存的存储后端实现。

use super::{ensure_active, CacheStorage};
use crate::config::StorageConfig;
use crate::error::Result;
use crate::expiration::ResolvedExpiration;
use async_trait::async_trait;
use chrono::Utc;
use futures::future;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const NEVER: u64 = u64::MAX;

/// 存储条目
///
/// 过期时间以存储创建时刻为基准的纳秒偏移表示，滑动过期命中时原地推后
#[derive(Clone)]
struct StoredEntry {
    bytes: Arc<[u8]>,
    deadline: Arc<AtomicU64>,
    sliding: Option<Duration>,
}

impl StoredEntry {
    fn is_expired(&self, now: u64) -> bool {
        let deadline = self.deadline.load(Ordering::Acquire);
        deadline != NEVER && now >= deadline
    }
}

/// 内存存储后端
///
/// 基于Moka的内存缓存，容量淘汰由Moka负责，过期判断使用tokio时钟，
/// 因此在暂停时钟的测试中可以通过推进时间触发过期
#[derive(Clone)]
pub struct MemoryStorage {
    cache: Cache<String, StoredEntry>,
    epoch: Instant,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

impl MemoryStorage {
    /// 创建新的内存存储
    ///
    /// # 参数
    ///
    /// * `max_capacity` - 最大条目数
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
            epoch: Instant::now(),
        }
    }

    /// 根据存储配置创建
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.max_capacity)
    }

    /// 当前条目数（会先处理Moka的挂起任务）
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// 仅当缓存中仍是读到的那个条目时才删除，并发写入的新值保持不变
    async fn remove_if_current(&self, key: &str, read: &StoredEntry) {
        let read = read.deadline.clone();
        let result = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(current) if Arc::ptr_eq(&current.value().deadline, &read) => Op::Remove,
                    _ => Op::Nop,
                };
                future::ready(op)
            })
            .await;
        if matches!(result, CompResult::Removed(_)) {
            debug!("Memory try_get: key={}, expired entry removed", key);
        }
    }

    fn now_nanos(&self) -> u64 {
        nanos(Instant::now().saturating_duration_since(self.epoch))
    }

    fn deadline_after(&self, ttl: Duration) -> u64 {
        self.now_nanos().saturating_add(nanos(ttl))
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(NEVER - 1)
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    #[instrument(skip(self, cancel), level = "debug")]
    async fn try_get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        ensure_active(cancel)?;

        let Some(entry) = self.cache.get(key).await else {
            debug!("Memory try_get: key={}, found=false", key);
            return Ok(None);
        };

        let now = self.now_nanos();
        if entry.is_expired(now) {
            self.remove_if_current(key, &entry).await;
            debug!("Memory try_get: key={}, expired=true", key);
            return Ok(None);
        }

        if let Some(sliding) = entry.sliding {
            entry
                .deadline
                .fetch_max(now.saturating_add(nanos(sliding)), Ordering::AcqRel);
        }

        debug!("Memory try_get: key={}, found=true", key);
        Ok(Some(entry.bytes.to_vec()))
    }

    #[instrument(skip(self, value, cancel), level = "debug", fields(value_len = value.len()))]
    async fn try_set(
        &self,
        key: &str,
        value: Vec<u8>,
        expiration: ResolvedExpiration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_active(cancel)?;

        let deadline = match (expiration.absolute, expiration.sliding) {
            (Some(at), _) => match (at - Utc::now()).to_std() {
                Ok(remaining) => self.deadline_after(remaining),
                Err(_) => {
                    // 绝对过期时间已过，不写入并清除旧值
                    self.cache.remove(key).await;
                    debug!("Memory try_set: key={}, already expired, removed", key);
                    return Ok(());
                }
            },
            (None, Some(sliding)) => self.deadline_after(sliding),
            (None, None) => NEVER,
        };

        let entry = StoredEntry {
            bytes: Arc::from(value),
            deadline: Arc::new(AtomicU64::new(deadline)),
            sliding: expiration.sliding.filter(|_| expiration.absolute.is_none()),
        };
        self.cache.insert(key.to_string(), entry).await;
        debug!("Memory try_set: key={}, expiration={:?}", key, expiration);
        Ok(())
    }

    #[instrument(skip(self, cancel), level = "debug")]
    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        ensure_active(cancel)?;
        self.cache.remove(key).await;
        Ok(())
    }

    #[instrument(skip(self, cancel), level = "debug")]
    async fn clear_all(&self, cancel: &CancellationToken) -> Result<()> {
        ensure_active(cancel)?;
        self.cache.invalidate_all();
        debug!("Memory clear_all: 缓存已清空");
        Ok(())
    }
}
