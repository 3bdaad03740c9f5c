//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了按键互斥的锁池。
//!
//! 每个正在被争用的键对应一个单许可信号量。锁对象在等待者归零后
//! 从活跃表移入空闲列表，下次出现新键时重新绑定键名后复用。
//! 所有簿记操作都在一个池级互斥锁内完成，且临界区内不包含任何 `.await`；
//! 等待信号量发生在临界区之外，因此一个键的争用不会阻塞其他键的簿记。

use crate::config::LockPoolConfig;
use crate::error::{CacheError, Result};
use ahash::AHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

/// 单个键的锁对象
///
/// 只由锁池持有，不会暴露给调用方
struct KeyedLock {
    /// 当前绑定的键，位于空闲列表时为空
    key: String,
    /// 可用性信号，初始为可用
    semaphore: Arc<Semaphore>,
    /// 持有者与等待者总数
    waiters: usize,
}

impl KeyedLock {
    fn new() -> Self {
        Self {
            key: String::new(),
            semaphore: Arc::new(Semaphore::new(1)),
            waiters: 0,
        }
    }

    fn rekey(&mut self, key: &str) {
        self.key.clear();
        self.key.push_str(key);
    }
}

/// 锁池内部状态
struct PoolState {
    active: AHashMap<String, KeyedLock>,
    free: Vec<KeyedLock>,
    max_free: usize,
    closed: bool,
}

impl PoolState {
    /// 进入等待：增加等待者计数，必要时从空闲列表取出锁对象
    fn enter(&mut self, key: &str) -> Arc<Semaphore> {
        if let Some(lock) = self.active.get_mut(key) {
            lock.waiters += 1;
            return lock.semaphore.clone();
        }

        let mut lock = self.free.pop().unwrap_or_else(KeyedLock::new);
        lock.rekey(key);
        lock.waiters = 1;
        let semaphore = lock.semaphore.clone();
        self.active.insert(key.to_owned(), lock);
        semaphore
    }

    /// 离开：减少等待者计数，归零时将锁对象退回空闲列表
    fn leave(&mut self, key: &str) {
        let Some(lock) = self.active.get_mut(key) else {
            warn!("KeyedLockPool leave: key={} not active, waiter count out of sync", key);
            return;
        };

        debug_assert!(lock.waiters > 0, "waiter count underflow for key {}", key);
        lock.waiters = lock.waiters.saturating_sub(1);
        if lock.waiters > 0 {
            return;
        }

        if let Some(mut lock) = self.active.remove(key) {
            lock.key.clear();
            if !self.closed && self.free.len() < self.max_free {
                self.free.push(lock);
            }
        }
    }
}

struct PoolShared {
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        // 临界区内只做O(1)的表操作，不会在持锁期间panic
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, key: &str, permit: OwnedSemaphorePermit) {
        let mut state = self.state();
        drop(permit);
        state.leave(key);
        trace!("KeyedLockPool release: key={}", key);
    }

    fn abandon(&self, key: &str) {
        self.state().leave(key);
        trace!("KeyedLockPool abandon: key={}", key);
    }
}

/// 按键互斥锁池
///
/// 同一键在任意时刻至多一个持有者；不同键之间完全独立。
/// 同一键的多个等待者之间不保证先来先得。
#[derive(Clone)]
pub struct KeyedLockPool {
    shared: Arc<PoolShared>,
}

impl Default for KeyedLockPool {
    fn default() -> Self {
        Self::new(&LockPoolConfig::default())
    }
}

impl KeyedLockPool {
    /// 创建新的锁池
    pub fn new(config: &LockPoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    active: AHashMap::new(),
                    free: Vec::new(),
                    max_free: config.max_free_locks,
                    closed: false,
                }),
            }),
        }
    }

    /// 获取指定键的锁
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `cancel` - 取消信号，仅取消本次等待
    ///
    /// # 返回值
    ///
    /// 成功时返回锁句柄；取消信号先于授权触发时返回 `Cancelled`；
    /// 锁池关闭时返回 `Closed`
    #[instrument(skip(self, cancel), level = "debug")]
    pub async fn acquire(&self, key: &str, cancel: &CancellationToken) -> Result<LockHandle> {
        let semaphore = {
            let mut state = self.shared.state();
            if state.closed {
                return Err(CacheError::Closed);
            }
            state.enter(key)
        };

        // 未获得授权就离开时（取消、关闭或future被丢弃）必须自行减少计数
        let pending = PendingWait {
            shared: &self.shared,
            key,
            armed: true,
        };

        let acquired = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CacheError::Cancelled),
            permit = semaphore.acquire_owned() => permit.map_err(|_| CacheError::Closed),
        };

        match acquired {
            Ok(permit) => {
                pending.disarm();
                debug!("KeyedLockPool acquire: key={}, granted=true", key);
                Ok(LockHandle {
                    shared: self.shared.clone(),
                    key: key.to_owned(),
                    permit: Some(permit),
                })
            }
            Err(e) => {
                debug!("KeyedLockPool acquire: key={}, granted=false, reason={}", key, e);
                Err(e)
            }
        }
    }

    /// 关闭锁池
    ///
    /// 关闭所有底层信号量，正在等待的调用方将收到 `Closed`，
    /// 之后的 `acquire` 调用也将返回 `Closed`。重复调用无副作用。
    #[instrument(skip(self), level = "info")]
    pub fn close(&self) {
        let mut state = self.shared.state();
        if state.closed {
            return;
        }
        state.closed = true;
        for lock in state.active.values() {
            lock.semaphore.close();
        }
        for lock in state.free.drain(..) {
            lock.semaphore.close();
        }
        debug!("KeyedLockPool closed, active={}", state.active.len());
    }

    /// 锁池是否已关闭
    pub fn is_closed(&self) -> bool {
        self.shared.state().closed
    }

    /// 当前被争用的键数量
    pub fn active_len(&self) -> usize {
        self.shared.state().active.len()
    }

    /// 空闲列表中的锁对象数量
    pub fn free_len(&self) -> usize {
        self.shared.state().free.len()
    }

    /// 指定键的持有者与等待者总数
    pub fn waiters(&self, key: &str) -> usize {
        self.shared
            .state()
            .active
            .get(key)
            .map_or(0, |lock| lock.waiters)
    }
}

struct PendingWait<'a> {
    shared: &'a PoolShared,
    key: &'a str,
    armed: bool,
}

impl PendingWait<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingWait<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.abandon(self.key);
        }
    }
}

/// 锁句柄
///
/// 由 [`KeyedLockPool::acquire`] 返回，唯一的操作是 [`LockHandle::release`]。
/// 若句柄在未显式释放的情况下被丢弃，丢弃路径会执行同样的释放。
pub struct LockHandle {
    shared: Arc<PoolShared>,
    key: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl LockHandle {
    /// 句柄对应的键
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 释放锁，唤醒同一键上的一个等待者
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.shared.release(&self.key, permit);
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key)
            .field("held", &self.permit.is_some())
            .finish()
    }
}
