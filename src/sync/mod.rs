//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的并发同步原语。

pub mod keyed_lock;

pub use keyed_lock::{KeyedLockPool, LockHandle};
