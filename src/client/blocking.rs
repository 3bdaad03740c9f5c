//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存客户端的同步适配器。

use super::CacheAsideClient;
use crate::error::Result;
use crate::expiration::ExpirationSpec;
use futures::executor::block_on;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 同步缓存适配器
///
/// 每个方法都会阻塞当前线程直到异步操作完成。
///
/// **注意**：不要在异步运行时的工作线程中调用这些方法。
/// 若当前线程正是需要推进存储或加载函数的线程，阻塞会导致死锁；
/// 在异步上下文中请直接使用 [`CacheAsideClient`]。
#[derive(Clone)]
pub struct BlockingCache {
    client: Arc<CacheAsideClient>,
}

impl BlockingCache {
    pub fn new(client: Arc<CacheAsideClient>) -> Self {
        Self { client }
    }

    /// 底层异步客户端
    pub fn client(&self) -> &Arc<CacheAsideClient> {
        &self.client
    }

    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        block_on(self.client.get(key, &CancellationToken::new()))
    }

    pub fn set<T>(&self, key: &str, value: &T, expiration: ExpirationSpec<T>) -> Result<()>
    where
        T: Serialize + Sync,
    {
        block_on(
            self.client
                .set(key, value, expiration, &CancellationToken::new()),
        )
    }

    /// 同步版本的 `get_or_set`，加载函数同样是同步的
    pub fn get_or_set<T, F>(
        &self,
        key: &str,
        loader: F,
        expiration: ExpirationSpec<T>,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Result<Option<T>> + Send,
    {
        block_on(self.client.get_or_set(
            key,
            move || async move { loader() },
            expiration,
            &CancellationToken::new(),
        ))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        block_on(self.client.remove(key, &CancellationToken::new()))
    }

    pub fn clear_all(&self) -> Result<()> {
        block_on(self.client.clear_all(&CancellationToken::new()))
    }
}
