//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存存储后端的契约以及内置的存储实现。

pub mod memory;
pub mod null;

use crate::error::Result;
use crate::expiration::ResolvedExpiration;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use memory::MemoryStorage;
pub use null::NullStorage;

/// 缓存存储特征
///
/// 物理存储只处理字节，类型化由缓存客户端的序列化器完成。
/// 实现必须支持并发调用。
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// 读取缓存值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `cancel` - 取消信号
    ///
    /// # 返回值
    ///
    /// 命中时返回字节，未命中或已过期返回None
    async fn try_get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>>;

    /// 写入缓存值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `value` - 缓存值（字节）
    /// * `expiration` - 过期参数，绝对过期与滑动过期至多设置其一，都为空表示永不过期
    /// * `cancel` - 取消信号
    async fn try_set(
        &self,
        key: &str,
        value: Vec<u8>,
        expiration: ResolvedExpiration,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// 删除缓存项
    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()>;

    /// 清空所有缓存项
    async fn clear_all(&self, cancel: &CancellationToken) -> Result<()>;
}

/// 取消信号已触发时返回 `Cancelled`
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(crate::error::CacheError::Cancelled)
    } else {
        Ok(())
    }
}
