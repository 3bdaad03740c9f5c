//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了旁路缓存客户端。
//!
//! `get_or_set` 在未命中时按键加锁，加锁后再读一次存储；只有仍未命中时才调用加载函数，
//! 因此同一进程内同一键至多只有一个加载函数在执行，后到的调用方直接读到刚写入的值。

pub mod blocking;

use crate::backend::{CacheStorage, MemoryStorage};
use crate::config::{CacheConfig, ExpirationSettings, LockPoolConfig};
use crate::error::{CacheError, Result};
use crate::expiration::ExpirationSpec;
use crate::metrics::CacheMetrics;
use crate::serialization::{Serializer, SerializerEnum};
use crate::sync::KeyedLockPool;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use blocking::BlockingCache;

/// 旁路缓存客户端
///
/// 纯命中路径不会获取任何锁。`remove` 与 `clear_all` 也不加锁，
/// 正在进行的加载可能在删除之后重新写入该键。
#[derive(Clone)]
pub struct CacheAsideClient {
    /// 服务名称
    service_name: String,
    /// 存储后端
    storage: Arc<dyn CacheStorage>,
    /// 过期等级解析器
    settings: Arc<dyn ExpirationSettings>,
    /// 序列化器
    serializer: SerializerEnum,
    /// 按键锁池
    locks: KeyedLockPool,
    /// 指标
    metrics: Arc<CacheMetrics>,
}

impl CacheAsideClient {
    /// 创建新的缓存客户端
    ///
    /// # 参数
    ///
    /// * `service_name` - 服务名称
    /// * `storage` - 存储后端
    /// * `settings` - 过期等级解析器
    /// * `serializer` - 序列化器
    /// * `pool_config` - 锁池配置
    pub fn new(
        service_name: impl Into<String>,
        storage: Arc<dyn CacheStorage>,
        settings: Arc<dyn ExpirationSettings>,
        serializer: SerializerEnum,
        pool_config: &LockPoolConfig,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            storage,
            settings,
            serializer,
            locks: KeyedLockPool::new(pool_config),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    /// 根据配置创建使用内存存储的客户端
    #[instrument(skip(config), level = "info", fields(service = %config.service_name))]
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let storage = Arc::new(MemoryStorage::from_config(&config.storage));
        Self::with_storage(config, storage)
    }

    /// 根据配置创建使用指定存储后端的客户端
    pub fn with_storage(config: &CacheConfig, storage: Arc<dyn CacheStorage>) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;
        info!(
            "Initializing CacheAsideClient for service {}",
            config.service_name
        );
        Ok(Self::new(
            config.service_name.clone(),
            storage,
            Arc::new(config.expiration.clone()),
            SerializerEnum::from_config(&config.serialization),
            &config.lock_pool,
        ))
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn lock_pool(&self) -> &KeyedLockPool {
        &self.locks
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// 获取缓存值，只读一次存储，不加锁
    #[instrument(skip(self, cancel), level = "debug", fields(service = %self.service_name))]
    pub async fn get<T>(&self, key: &str, cancel: &CancellationToken) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let value = self.read(key, cancel).await?;
        let result = if value.is_some() { "hit" } else { "miss" };
        self.metrics.record_request("get", result);
        Ok(value)
    }

    /// 获取缓存值，未命中时调用加载函数并写入缓存
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `loader` - 加载函数，返回 `None` 表示没有可缓存的值
    /// * `expiration` - 写入时使用的过期描述
    /// * `cancel` - 取消信号
    ///
    /// # 返回值
    ///
    /// 返回缓存值或加载到的值。加载函数的错误原样返回，且不会写入存储；
    /// 无论成功、失败还是取消，该键的锁都会被释放。
    /// 加载期间取消信号触发时，加载结果不会写入存储，调用方收到 `Cancelled`。
    #[instrument(
        skip(self, loader, expiration, cancel),
        level = "debug",
        fields(service = %self.service_name)
    )]
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
        expiration: ExpirationSpec<T>,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<T>>> + Send,
    {
        if let Some(value) = self.read(key, cancel).await? {
            self.metrics.record_request("get_or_set", "hit");
            return Ok(Some(value));
        }
        self.metrics.record_request("get_or_set", "miss");

        let started = Instant::now();
        let handle = self.locks.acquire(key, cancel).await?;
        self.metrics.record_lock_wait(started.elapsed());

        let result = self.load_locked(key, loader, &expiration, cancel).await;
        handle.release();
        result
    }

    async fn load_locked<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
        expiration: &ExpirationSpec<T>,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<T>>> + Send,
    {
        if let Some(value) = self.read(key, cancel).await? {
            debug!("get_or_set: key={} populated while waiting for lock", key);
            self.metrics.record_request("get_or_set", "late_hit");
            return Ok(Some(value));
        }

        let loaded = match loader().await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("get_or_set: loader failed for key {}: {}", key, e);
                self.metrics.record_request("load", "error");
                return Err(e);
            }
        };

        let Some(value) = loaded else {
            debug!("get_or_set: loader returned no value for key {}", key);
            self.metrics.record_request("load", "none");
            return Ok(None);
        };

        self.metrics.record_request("load", "success");
        self.write(key, &value, expiration, cancel).await?;
        Ok(Some(value))
    }

    /// 写入缓存值
    #[instrument(
        skip(self, value, expiration, cancel),
        level = "debug",
        fields(service = %self.service_name)
    )]
    pub async fn set<T>(
        &self,
        key: &str,
        value: &T,
        expiration: ExpirationSpec<T>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        self.write(key, value, &expiration, cancel).await?;
        self.metrics.record_request("set", "success");
        Ok(())
    }

    /// 删除缓存项
    #[instrument(skip(self, cancel), level = "debug", fields(service = %self.service_name))]
    pub async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        self.storage.remove(key, cancel).await?;
        self.metrics.record_request("remove", "success");
        Ok(())
    }

    /// 清空所有缓存项
    #[instrument(skip(self, cancel), level = "debug", fields(service = %self.service_name))]
    pub async fn clear_all(&self, cancel: &CancellationToken) -> Result<()> {
        self.storage.clear_all(cancel).await?;
        self.metrics.record_request("clear", "success");
        Ok(())
    }

    /// 关闭客户端的锁池
    ///
    /// 之后未命中的 `get_or_set` 将返回 `Closed`，`get`/`set` 等直通操作不受影响
    pub fn close(&self) {
        info!("Closing CacheAsideClient for service {}", self.service_name);
        self.locks.close();
    }

    async fn read<T>(&self, key: &str, cancel: &CancellationToken) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.storage.try_get(key, cancel).await? {
            Some(bytes) => Ok(Some(self.serializer.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write<T>(
        &self,
        key: &str,
        value: &T,
        expiration: &ExpirationSpec<T>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let resolved = expiration.resolve(value, self.settings.as_ref(), Utc::now());
        let bytes = self.serializer.serialize(value)?;
        self.storage.try_set(key, bytes, resolved, cancel).await
    }
}
