//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了空存储后端：读取总是未命中，写入不做任何事。

use super::{ensure_active, CacheStorage};
use crate::error::Result;
use crate::expiration::ResolvedExpiration;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 空存储后端
///
/// 适用于禁用缓存的环境，每次 `get_or_set` 都会调用加载函数
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStorage;

#[async_trait]
impl CacheStorage for NullStorage {
    async fn try_get(&self, _key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        ensure_active(cancel)?;
        Ok(None)
    }

    async fn try_set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _expiration: ResolvedExpiration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_active(cancel)
    }

    async fn remove(&self, _key: &str, cancel: &CancellationToken) -> Result<()> {
        ensure_active(cancel)
    }

    async fn clear_all(&self, cancel: &CancellationToken) -> Result<()> {
        ensure_active(cancel)
    }
}
